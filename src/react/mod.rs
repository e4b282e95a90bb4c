//! 认知层：Planner（LLM 规划与 Tool Call 解析）与 ReAct 主循环

pub mod loop_;
pub mod planner;

pub use loop_::{react_loop, ReactResult};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
