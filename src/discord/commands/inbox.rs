use crate::core::claw::format_inbox_count;
use crate::core::inbox::InboxSummary;
use crate::discord::{Context, Error};

/// Show the most recent messages in your Gmail inbox.
#[poise::command(slash_command, rename = "check-inbox")]
pub async fn check_inbox(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let reply = match ctx.data().claw.inbox_report().await {
        Ok(summary) => render_inbox(&summary),
        Err(err) => err.to_string(),
    };

    ctx.say(reply).await?;
    Ok(())
}

/// Keeps five entries well inside Discord's 2000 character message limit.
const MAX_SUBJECT_CHARS: usize = 120;
const MAX_SENDER_CHARS: usize = 80;

pub fn render_inbox(summary: &InboxSummary) -> String {
    let mut text = format_inbox_count(summary.message_count);

    for (i, message) in summary.messages.iter().enumerate() {
        text.push_str(&format!(
            "\n{}. **{}**\n   From: {}",
            i + 1,
            truncate_chars(&message.subject, MAX_SUBJECT_CHARS),
            truncate_chars(&message.from, MAX_SENDER_CHARS)
        ));
    }

    if summary.skipped > 0 {
        text.push_str(&format!(
            "\n_{} message(s) could not be loaded._",
            summary.skipped
        ));
    }

    text
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(max - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inbox::inbox_models::MessageSummary;

    #[test]
    fn empty_inbox_is_just_the_headline() {
        assert_eq!(
            render_inbox(&InboxSummary::default()),
            "📭 Your inbox is empty. Nice!"
        );
    }

    #[test]
    fn messages_are_numbered() {
        let summary = InboxSummary {
            message_count: 2,
            messages: vec![
                MessageSummary {
                    id: "a".to_string(),
                    subject: "Lunch?".to_string(),
                    from: "Sam <sam@example.com>".to_string(),
                },
                MessageSummary {
                    id: "b".to_string(),
                    subject: "No Subject".to_string(),
                    from: "Unknown".to_string(),
                },
            ],
            skipped: 1,
        };

        let text = render_inbox(&summary);

        assert!(text.starts_with("📬 You have 2 messages in your inbox"));
        assert!(text.contains("\n1. **Lunch?**\n   From: Sam <sam@example.com>"));
        assert!(text.contains("\n2. **No Subject**\n   From: Unknown"));
        assert!(text.ends_with("_1 message(s) could not be loaded._"));
    }

    #[test]
    fn long_subjects_and_senders_fit_in_one_message() {
        let messages = (0..5)
            .map(|i| MessageSummary {
                id: i.to_string(),
                subject: "Quarterly report ".repeat(60),
                from: format!("{}@example.com", "very.long.sender.name".repeat(20)),
            })
            .collect();
        let summary = InboxSummary {
            message_count: 5,
            messages,
            skipped: 0,
        };

        let text = render_inbox(&summary);

        assert!(text.chars().count() <= 2000);
        assert!(text.contains("\n1. **Quarterly report"));
        assert!(text.contains("…**\n   From: very.long.sender.name"));
    }

    #[test]
    fn short_fields_are_left_alone() {
        assert_eq!(truncate_chars("Lunch?", MAX_SUBJECT_CHARS), "Lunch?");
        assert_eq!(truncate_chars("abcdef", 4), "abc…");
    }
}
