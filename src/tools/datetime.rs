//! Current date and time lookup.

use super::traits::{Tool, ToolError, ToolInput, ToolOutput};
use super::user_line;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct GetDateTime {
    clock: Clock,
}

impl GetDateTime {
    /// Reads the local wall clock.
    pub fn new() -> Self {
        Self::with_clock(|| Local::now().naive_local())
    }

    pub fn with_clock(clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    fn format(now: NaiveDateTime) -> String {
        format!(
            "Current Date: {}. Current Time: {}",
            now.format("%d-%m-%Y %A %B"),
            now.format("%H:%M:%S")
        )
    }
}

impl Default for GetDateTime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetDateTime {
    fn name(&self) -> &str {
        "GetDateTime"
    }

    fn when_to_use(&self) -> String {
        "This tool is used to get the current time, date, day of the week, etc.".into()
    }

    fn examples(&self) -> String {
        ["how many days till new year?", "whats the time?"]
            .iter()
            .map(|msg| {
                format!(
                    "<chat&tools>\n{}\n<response>\n{{\n    \"toolsToCall\": [\n        {{\"name\": \"GetDateTime\"}}\n    ]\n}}\n</response>\n",
                    user_line(msg)
                )
            })
            .collect()
    }

    fn answer_examples(&self) -> String {
        format!(
            "<chat&tools>\n{}\n{}\n<response>\nThe current time is 14:28:30.\n</response>",
            user_line("tell me the time pls"),
            serde_json::json!({
                "role": "GetDateTime",
                "content": "Current Date: 03-01-2024 Wednesday January. Current Time: 14:28:30"
            })
        )
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::free(Self::format((self.clock)())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn formats_date_and_time() {
        let tool = GetDateTime::with_clock(|| {
            NaiveDate::from_ymd_opt(2024, 1, 3)
                .unwrap()
                .and_hms_opt(14, 28, 30)
                .unwrap()
        });

        let out = tool.execute(&ToolInput::None).await.unwrap();
        assert_eq!(
            out.text,
            "Current Date: 03-01-2024 Wednesday January. Current Time: 14:28:30"
        );
        assert_eq!(out.cost, 0.0);
    }
}
