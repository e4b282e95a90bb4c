//! 事件处理
//!
//! 轮询 crossterm 键盘事件，快捷键转为 UiCommand，其余按键交给 App 编辑输入框。

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 快捷键对应的界面动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Quit,
    /// 清空聊天记录
    Clear,
    Connect,
    Disconnect,
    /// 把第 n 个示例问题填入输入框（F1 对应 0）
    Example(usize),
}

/// 应用事件：来自快捷键的命令或原始按键
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(UiCommand),
    Key(KeyEvent),
}

pub struct EventHandler {
    tick: Duration,
}

impl EventHandler {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// 等待至多一个 tick；无按键时返回 None，主循环借此刷新后台结果
    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(self.tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(map_key(key)));
                }
            }
        }
        Ok(None)
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

pub fn map_key(key: KeyEvent) -> AppEvent {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => AppEvent::Command(UiCommand::Quit),
        KeyCode::Esc => AppEvent::Command(UiCommand::Quit),
        KeyCode::Char('l') if ctrl => AppEvent::Command(UiCommand::Clear),
        KeyCode::Char('o') if ctrl => AppEvent::Command(UiCommand::Connect),
        KeyCode::Char('d') if ctrl => AppEvent::Command(UiCommand::Disconnect),
        KeyCode::F(n @ 1..=9) => AppEvent::Command(UiCommand::Example(usize::from(n - 1))),
        _ => AppEvent::Key(key),
    }
}
