//! 界面渲染
//!
//! 自上而下：标题与说明、（工具聊天）服务器路径与状态栏、对话历史（按角色着色、工具结果折叠、按宽度换行）、
//! 输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::memory::ChatRole;
use crate::ui::app::{App, Focus};

/// 单条消息在 UI 中显示的最大字符数
const MAX_DISPLAY_CHARS: usize = 1200;
/// 工具调用/观察类消息的显示上限
const MAX_TOOL_DISPLAY_CHARS: usize = 280;

fn is_tool_result(content: &str) -> bool {
    content.starts_with("Tool call:") || content.starts_with("Observation from ")
}

/// 对过长内容做折叠：保留前 N 字 + 省略提示
fn truncate_for_display(content: &str) -> String {
    let limit = if is_tool_result(content) {
        MAX_TOOL_DISPLAY_CHARS
    } else {
        MAX_DISPLAY_CHARS
    };
    let total = content.chars().count();
    if total <= limit {
        return content.to_string();
    }
    let head: String = content.chars().take(limit).collect();
    format!("{}\n... [{}자 중 일부만 표시]", head, total)
}

/// 按字符数换行，避免在 UTF-8 中间截断
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        let mut count = 0usize;
        for ch in para.chars() {
            if count >= width {
                lines.push(std::mem::take(&mut line));
                count = 0;
            }
            line.push(ch);
            count += 1;
        }
        lines.push(line);
    }
    lines
}

fn transcript_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut text_lines: Vec<Line> = Vec::new();
    if app.history.is_empty() {
        text_lines.push(Line::from(Span::styled(
            app.info().description,
            Style::default().fg(Color::DarkGray),
        )));
        for (i, example) in app.info().examples.iter().enumerate() {
            text_lines.push(Line::from(Span::styled(
                format!("  F{}  {}", i + 1, example),
                Style::default().fg(Color::DarkGray),
            )));
        }
        return text_lines;
    }

    for (idx, turn) in app.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(""));
        }
        let (prefix, color) = match turn.role {
            ChatRole::User => ("나  ", Color::Cyan),
            ChatRole::Assistant => ("AI  ", Color::Green),
        };
        let display = truncate_for_display(&turn.content);
        for (i, line) in wrap_text(&display, width.max(20)).into_iter().enumerate() {
            let pref = if i == 0 { prefix } else { "    " };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ]));
        }
    }
    text_lines
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let color = if focused { Color::Yellow } else { Color::Blue };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn draw_connection(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let path = Paragraph::new(app.server_path.as_str())
        .block(field_block(" 서버 경로 (Ctrl+O 연결 · Ctrl+D 해제) ", app.focus == Focus::ServerPath));
    f.render_widget(path, chunks[0]);

    let mut lines = vec![Line::from(app.status_line().unwrap_or_default())];
    if let Some(notice) = &app.notice {
        lines.extend(notice.lines().map(|l| Line::from(l.to_string())));
    }
    let status = Paragraph::new(Text::from(lines))
        .block(field_block(" 연결 상태 ", false))
        .wrap(Wrap { trim: false });
    f.render_widget(status, chunks[1]);
}

/// 绘制一帧；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(f: &mut Frame, app: &App, out: &mut (usize, usize)) {
    let connection_height = if app.is_tool_chat() { 5 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(connection_height),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    if app.is_tool_chat() {
        draw_connection(f, app, chunks[0]);
    }

    let conv_area = chunks[1];
    // 边框 + 滚动条
    let content_width = conv_area.width.saturating_sub(3) as usize;
    let title = match app.busy {
        Some(label) => format!(" {} │ {}… ", app.info().title, label),
        None => format!(" {} ", app.info().title),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let text_lines = transcript_lines(app, content_width.saturating_sub(4));
    let content_height = conv_area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let scroll_offset = app.scroll.min(total_lines.saturating_sub(content_height));

    let paragraph = Paragraph::new(Text::from(text_lines))
        .block(block)
        .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    f.render_widget(paragraph, conv_area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, conv_area, &mut scrollbar_state);
    }

    let hint = if app.is_tool_chat() {
        " Enter 전송 │ Tab 경로/입력 │ F1-F3 예시 │ Ctrl+L 지우기 │ Esc 종료 "
    } else {
        " Enter 전송 │ F1-F4 예시 │ ↑↓ 스크롤 │ Ctrl+L 지우기 │ Esc 종료 "
    };
    let input_block = field_block(" 메시지 ", app.focus == Focus::Input)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(app.info().placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(app.input.as_str())
    };
    f.render_widget(input.block(input_block), chunks[2]);

    out.0 = total_lines;
    out.1 = content_height;
}
