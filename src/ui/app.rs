//! TUI 应用主循环
//!
//! 两种模式共用一个界面：
//! - 工具聊天：服务器路径输入框、连接/断开、状态栏
//! - 근로기준법 RAG 聊天：标题、示例问题
//!
//! façade 调用会阻塞到宿主返回或超时，所以每个动作放到单独的线程上执行，结果经 mpsc 回到主循环，
//! 等待期间界面照常刷新。

use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crossterm::event::{KeyCode, KeyEvent};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::memory::ChatTurn;
use crate::rag::RagFacade;
use crate::session::ToolChatFacade;
use crate::ui::event::{AppEvent, EventHandler, UiCommand};
use crate::ui::render::draw;

/// 界面上的固定文案
#[derive(Debug, Clone, Copy)]
pub struct ModeInfo {
    pub title: &'static str,
    pub description: &'static str,
    pub placeholder: &'static str,
    pub examples: &'static [&'static str],
}

pub const TOOL_CHAT_INFO: ModeInfo = ModeInfo {
    title: "🤖 MCP Chat Assistant",
    description: "MCP 서버에 연결해 도구를 사용하는 AI 어시스턴트입니다.",
    placeholder: "질문을 입력하세요... (예: 3 + 5 곱하기 12는?)",
    examples: &["3 + 5 × 12 계산해줘", "22 더하기 8은 얼마죠?", "7과 6을 곱한 값은?"],
};

pub const RAG_INFO: ModeInfo = ModeInfo {
    title: "근로기준법 Q&A 챗봇",
    description: "근로기준법 관련 질문에 답변하는 AI 챗봇입니다.",
    placeholder: "근로기준법에 대해 질문하세요...",
    examples: &[
        "근로계약서에는 어떤 내용이 포함되어야 하나요?",
        "연차휴가는 어떻게 계산하나요?",
        "최저임금은 어떻게 정해지나요?",
        "해고 절차는 어떻게 되나요?",
    ],
};

/// 界面背后的同步接口
pub enum ChatMode {
    ToolChat(Arc<ToolChatFacade<'static>>),
    Rag(Arc<RagFacade<'static>>),
}

impl ChatMode {
    pub fn info(&self) -> &'static ModeInfo {
        match self {
            ChatMode::ToolChat(_) => &TOOL_CHAT_INFO,
            ChatMode::Rag(_) => &RAG_INFO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    ServerPath,
    Input,
}

/// 后台动作的结果
#[derive(Debug)]
enum Outcome {
    /// 连接 / 断开的提示文字
    Notice(String),
    Reply(Vec<ChatTurn>),
}

pub struct App {
    mode: ChatMode,
    pub history: Vec<ChatTurn>,
    pub input: String,
    pub server_path: String,
    pub focus: Focus,
    /// 最近一次连接 / 断开的结果
    pub notice: Option<String>,
    /// 正在执行的后台动作名；为 Some 时不接受新动作
    pub busy: Option<&'static str>,
    pub scroll: usize,
    pub should_quit: bool,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
}

impl App {
    pub fn new(mode: ChatMode, server_path: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            mode,
            history: Vec::new(),
            input: String::new(),
            server_path: server_path.into(),
            focus: Focus::Input,
            notice: None,
            busy: None,
            scroll: 0,
            should_quit: false,
            tx,
            rx,
        }
    }

    pub fn info(&self) -> &'static ModeInfo {
        self.mode.info()
    }

    pub fn is_tool_chat(&self) -> bool {
        matches!(self.mode, ChatMode::ToolChat(_))
    }

    /// 工具聊天模式下的连接状态行
    pub fn status_line(&self) -> Option<String> {
        match &self.mode {
            ChatMode::ToolChat(facade) => Some(facade.status_line()),
            ChatMode::Rag(_) => None,
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Command(cmd) => self.handle_command(cmd),
            AppEvent::Key(key) => self.handle_key(key),
        }
    }

    fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Quit => self.should_quit = true,
            UiCommand::Clear => {
                if self.busy.is_none() {
                    self.history.clear();
                    self.scroll = 0;
                }
            }
            UiCommand::Connect => self.connect(),
            UiCommand::Disconnect => self.disconnect(),
            UiCommand::Example(i) => {
                if let Some(example) = self.info().examples.get(i) {
                    self.input = (*example).to_string();
                    self.focus = Focus::Input;
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => match self.focus {
                Focus::Input => self.submit(),
                Focus::ServerPath => self.connect(),
            },
            KeyCode::Tab | KeyCode::BackTab if self.is_tool_chat() => {
                self.focus = match self.focus {
                    Focus::Input => Focus::ServerPath,
                    Focus::ServerPath => Focus::Input,
                };
            }
            KeyCode::Backspace => {
                self.focused_buffer().pop();
            }
            KeyCode::Char(c) => self.focused_buffer().push(c),
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            KeyCode::Home => self.scroll = 0,
            KeyCode::End => self.scroll = usize::MAX,
            _ => {}
        }
    }

    fn focused_buffer(&mut self) -> &mut String {
        match self.focus {
            Focus::Input => &mut self.input,
            Focus::ServerPath => &mut self.server_path,
        }
    }

    fn submit(&mut self) {
        if self.busy.is_some() || self.input.trim().is_empty() {
            return;
        }
        let message = std::mem::take(&mut self.input);
        let history = self.history.clone();
        let tx = self.tx.clone();
        match &self.mode {
            ChatMode::ToolChat(facade) => {
                let facade = facade.clone();
                self.spawn_action("응답 대기 중", move || {
                    let (history, _) = facade.send_sync(&message, &history);
                    let _ = tx.send(Outcome::Reply(history));
                });
            }
            ChatMode::Rag(facade) => {
                let facade = facade.clone();
                self.spawn_action("답변 생성 중", move || {
                    let (history, _) = facade.answer_sync(&message, &history);
                    let _ = tx.send(Outcome::Reply(history));
                });
            }
        }
    }

    fn connect(&mut self) {
        let ChatMode::ToolChat(facade) = &self.mode else {
            return;
        };
        if self.busy.is_some() {
            return;
        }
        let facade = facade.clone();
        let path = self.server_path.clone();
        let tx = self.tx.clone();
        self.spawn_action("연결 중", move || {
            let _ = tx.send(Outcome::Notice(facade.connect_sync(&path)));
        });
    }

    fn disconnect(&mut self) {
        let ChatMode::ToolChat(facade) = &self.mode else {
            return;
        };
        if self.busy.is_some() {
            return;
        }
        let facade = facade.clone();
        let tx = self.tx.clone();
        self.spawn_action("연결 해제 중", move || {
            let _ = tx.send(Outcome::Notice(facade.disconnect_sync()));
        });
    }

    fn spawn_action<F>(&mut self, label: &'static str, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let spawned = thread::Builder::new()
            .name("nomu-ui-action".to_string())
            .spawn(work);
        match spawned {
            Ok(_) => self.busy = Some(label),
            Err(e) => {
                tracing::error!("failed to spawn ui action thread: {}", e);
                self.notice = Some(format!("❌ 작업을 시작하지 못했습니다: {}", e));
            }
        }
    }

    /// 收取已完成的后台动作结果；返回是否有更新
    pub fn drain_outcomes(&mut self) -> bool {
        let mut updated = false;
        while let Ok(outcome) = self.rx.try_recv() {
            match outcome {
                Outcome::Notice(text) => self.notice = Some(text),
                Outcome::Reply(history) => {
                    self.history = history;
                    self.scroll = usize::MAX;
                }
            }
            self.busy = None;
            updated = true;
        }
        updated
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub fn run_app(app: &mut App) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, app);
    restore_terminal(&mut terminal)?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    let events = EventHandler::default();
    while !app.should_quit {
        app.drain_outcomes();

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| draw(f, app, &mut scroll_info))?;
        let (total_lines, viewport_height) = scroll_info;
        app.scroll = app.scroll.min(total_lines.saturating_sub(viewport_height));

        if let Some(ev) = events.poll()? {
            app.handle_event(ev);
        }
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use crossterm::event::KeyModifiers;

    use crate::core::HostRegistry;
    use crate::llm::{MockLlmClient, ScriptedLlmClient};
    use crate::memory::ChatRole;
    use crate::rag::{Passage, RagChain, RagError, Retriever};
    use crate::session::{FacadeTimeouts, SessionController, SessionOptions};

    struct NoContext;

    #[async_trait]
    impl Retriever for NoContext {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Passage>, RagError> {
            Ok(vec![])
        }
    }

    fn leaked_host() -> &'static HostRegistry {
        Box::leak(Box::new(HostRegistry::new()))
    }

    fn tool_chat_app() -> App {
        let controller = Arc::new(SessionController::new(
            Arc::new(MockLlmClient),
            SessionOptions::default(),
        ));
        let facade = ToolChatFacade::new(leaked_host(), controller, FacadeTimeouts::default());
        App::new(ChatMode::ToolChat(Arc::new(facade)), "nomu-math")
    }

    fn wait_idle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.busy.is_some() && Instant::now() < deadline {
            app.drain_outcomes();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(app.busy.is_none(), "background action did not finish");
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_example_fills_input() {
        let mut app = tool_chat_app();
        app.handle_event(AppEvent::Command(UiCommand::Example(1)));
        assert_eq!(app.input, "22 더하기 8은 얼마죠?");
        // 越界的示例编号忽略
        app.handle_event(AppEvent::Command(UiCommand::Example(8)));
        assert_eq!(app.input, "22 더하기 8은 얼마죠?");
    }

    #[test]
    fn test_tab_switches_between_path_and_input() {
        let mut app = tool_chat_app();
        app.handle_event(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::ServerPath);
        app.handle_event(key(KeyCode::Backspace));
        assert_eq!(app.server_path, "nomu-mat");
        app.handle_event(key(KeyCode::Tab));
        app.handle_event(key(KeyCode::Char('x')));
        assert_eq!(app.input, "x");
    }

    #[test]
    fn test_send_without_connection_shows_hint() {
        let mut app = tool_chat_app();
        app.input = "안녕".to_string();
        app.handle_event(key(KeyCode::Enter));
        assert!(app.input.is_empty());
        wait_idle(&mut app);

        assert_eq!(app.history.len(), 2);
        assert_eq!(app.history[0].content, "안녕");
        assert_eq!(app.history[1].role, ChatRole::Assistant);
        assert_eq!(app.history[1].content, "❌ 먼저 MCP 서버에 연결해주세요.");
        assert!(app.status_line().unwrap().starts_with("🔴"));
    }

    #[test]
    fn test_disconnect_reports_notice() {
        let mut app = tool_chat_app();
        app.handle_event(AppEvent::Command(UiCommand::Disconnect));
        wait_idle(&mut app);
        assert_eq!(app.notice.as_deref(), Some("🔌 서버 연결이 해제되었습니다."));
    }

    #[test]
    fn test_rag_mode_round_trip_and_clear() {
        let chain = Arc::new(RagChain::new(
            Arc::new(ScriptedLlmClient::new(["연차휴가는 1년간 80% 이상 출근 시 15일입니다."])),
            Arc::new(NoContext),
        ));
        let facade = RagFacade::new(leaked_host(), chain, Duration::from_secs(5));
        let mut app = App::new(ChatMode::Rag(Arc::new(facade)), "");
        assert!(app.status_line().is_none());

        app.handle_event(AppEvent::Command(UiCommand::Example(1)));
        app.handle_event(key(KeyCode::Enter));
        wait_idle(&mut app);
        assert_eq!(app.history.len(), 2);
        assert_eq!(app.history[0].content, "연차휴가는 어떻게 계산하나요?");

        // RAG 模式没有连接动作
        app.handle_event(AppEvent::Command(UiCommand::Connect));
        assert!(app.busy.is_none());

        app.handle_event(AppEvent::Command(UiCommand::Clear));
        assert!(app.history.is_empty());
    }
}
