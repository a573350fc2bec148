//! 展示层：行式控制台（事件渲染与输入解析）

pub mod console;

pub use console::{parse_line, render_event, render_sessions, ConsoleInput, HELP};
