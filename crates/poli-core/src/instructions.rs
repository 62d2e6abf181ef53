//! Builders for the orchestration prompts injected into each pane.

use poli_proto::Message;

/// Builds the text sent to the Planner and Executer at each phase.
#[derive(Debug, Default)]
pub struct InstructionBuilder;

impl InstructionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// The initial prompt handing a user request to the Planner.
    pub fn initial_task(&self, task_id: &str, description: &str) -> String {
        format!(
            r#"TASK_ID={task_id}

User request:
{description}

You are in a continuous dialogue. You will:
1. Create an initial plan and emit it as a tagged block addressed to EXECUTER with id={task_id}
2. Review EXECUTER's results when they are relayed back to you
3. Keep sending refinements until the task is fully complete

Use type="plan" for the initial plan and type="continue" for subsequent
instructions. When the task is fully complete, emit type="done"."#
        )
    }

    /// The prompt forwarding a Planner instruction to the Executer, with the
    /// envelope re-embedded verbatim.
    pub fn forward_to_executer(&self, msg: &Message) -> String {
        format!(
            r#"You received a {kind} from PLANNER:

{envelope}

Execute these steps carefully. You may emit STATUS blocks during execution.
When done, emit a RESULT block back to PLANNER with id={id}."#,
            kind = msg.kind,
            envelope = render_envelope(msg),
            id = msg.id,
        )
    }

    /// The prompt relaying an Executer result back to the Planner for review.
    pub fn review_result(&self, msg: &Message, round: u32, description: &str) -> String {
        format!(
            r#"EXECUTER has completed round {round} and reports:

{envelope}

Review this result and emit one of:
- type="continue" with next instructions if the task needs more work
- type="revision" if EXECUTER needs to fix something
- type="done" if the entire task is complete

Remember: the original user request was: {description}"#,
            envelope = render_envelope(msg),
        )
    }

    /// The single per-wait reminder sent when a phase is taking unusually long.
    pub fn nudge(&self) -> &'static str {
        "# Reminder: if you are finished, emit your tagged response block now."
    }

    /// Asks the Planner for a closing natural-language summary. No new
    /// blocks are expected after this.
    pub fn final_summary(&self) -> &'static str {
        "Task complete. Provide a concise final summary for the user about what \
         was accomplished. Do not emit any new POLI:MSG blocks."
    }
}

/// Re-wraps a message in its wire envelope, reusing the header the producer
/// emitted and an inner tag named after the kind.
fn render_envelope(msg: &Message) -> String {
    let tag = if msg.kind.is_empty() {
        "BODY".to_string()
    } else {
        msg.kind.to_ascii_uppercase()
    };
    format!(
        "[[POLI:MSG {header}]]\n<{tag}>\n{payload}\n</{tag}>\n[[/POLI:MSG]]",
        header = msg.header_json(),
        payload = msg.payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use poli_proto::{Role, kind};

    fn plan_message() -> Message {
        let mut header = serde_json::Map::new();
        header.insert("to".into(), "EXECUTER".into());
        header.insert("type".into(), "plan".into());
        header.insert("id".into(), "t1".into());
        Message {
            to: Role::Executer,
            kind: kind::PLAN.to_string(),
            id: "t1".to_string(),
            payload: "Step 1: create hello.txt".to_string(),
            header,
            raw_offset: 0,
        }
    }

    #[test]
    fn initial_task_embeds_id_and_request() {
        let builder = InstructionBuilder::new();
        let prompt = builder.initial_task("t1", "create hello.txt");
        assert!(prompt.contains("TASK_ID=t1"));
        assert!(prompt.contains("create hello.txt"));
        assert!(prompt.contains("type=\"done\""));
    }

    #[test]
    fn forwarded_plan_carries_payload_verbatim() {
        let builder = InstructionBuilder::new();
        let prompt = builder.forward_to_executer(&plan_message());
        assert!(prompt.contains("Step 1: create hello.txt"));
        assert!(prompt.contains("[[POLI:MSG "));
        assert!(prompt.contains("<PLAN>"));
        assert!(prompt.contains("RESULT block back to PLANNER with id=t1"));
    }

    #[test]
    fn review_prompt_names_the_round_and_request() {
        let builder = InstructionBuilder::new();
        let mut msg = plan_message();
        msg.kind = kind::RESULT.to_string();
        msg.payload = "hello.txt created".to_string();
        let prompt = builder.review_result(&msg, 2, "create hello.txt");
        assert!(prompt.contains("round 2"));
        assert!(prompt.contains("hello.txt created"));
        assert!(prompt.contains("create hello.txt"));
    }

    #[test]
    fn forwarded_envelope_reparses() {
        let builder = InstructionBuilder::new();
        let prompt = builder.forward_to_executer(&plan_message());
        let parser = crate::BlockParser::new();
        let messages = parser.extract(&prompt, 0);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, "Step 1: create hello.txt");
        assert_eq!(messages[0].id, "t1");
    }
}
