//! The sentinel tool that ends planning.

use super::traits::{Tool, ToolError, ToolInput, ToolOutput};
use super::user_line;
use async_trait::async_trait;

/// Name the planner recognises as "stop planning and answer".
pub const READY_TOOL: &str = "ReadyToAnswer";

/// Sentinel tool. The planner never dispatches it; it only exists so the
/// model sees it described next to the real tools.
pub struct ReadyToAnswer;

#[async_trait]
impl Tool for ReadyToAnswer {
    fn name(&self) -> &str {
        READY_TOOL
    }

    fn when_to_use(&self) -> String {
        "This tool is used to gather the previous thoughts and data,\n\
         stop the planning/tool calling process and move on to formulating a full answer.\n\
         It should be used when an answer could be given just based on your current knowledge,\n\
         data and tool responses that are already there in the chat history,\n\
         or if none of the available tools would aide the answer.\n\
         This is the DEFAULT choice and needs no input!"
            .to_string()
    }

    fn examples(&self) -> String {
        ["hi", "tell me what 17 + 5 * 7 is", "can you tell me your name?"]
            .iter()
            .map(|msg| {
                format!(
                    "<chat&tools>\n{}\n<response>\n{{\n    \"toolsToCall\": [\n        {{\"name\": \"{}\"}}\n    ]\n}}\n</response>\n",
                    user_line(msg),
                    READY_TOOL
                )
            })
            .collect()
    }

    fn answer_examples(&self) -> String {
        format!(
            "<chat&tools>\n{}\n<response>\nHello, sir. How may I assist you today?\n</response>",
            user_line("hi")
        )
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::free(""))
    }
}
