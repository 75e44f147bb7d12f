use super::context_store::{ConversationTurn, TurnRole};
use crate::llm::LlmMessage;
use crate::partners::PartnerRecord;
use crate::weather::FORECAST_HORIZON_DAYS;
use chrono::NaiveDate;

const ASSISTANT_BRIEF: &str = "You are a helpful assistant that helps users plan business trips \
by combining business partner information with weather forecasts.

Your capabilities:
1. Look up business partners by name to find their location (business_partner_lookup)
2. Retrieve weather forecasts for a location (weather_forecast)
3. Combine both into practical trip planning advice

When the user asks about the weather for a partner visit, look up the partner first, then \
request the forecast for the partner's \"City, Country\" and pass the partner's name as \
partner_name. If a partner was already discussed and the user refers back to them, reuse the \
known location instead of looking it up again.

If a tool reports an error, explain it to the user in plain words. When a partner is not \
found, offer the suggested names if there are any. Be conversational and friendly, and give \
actionable advice, such as packing an umbrella when rain is likely.";

/// System prompt for one turn.
pub fn system_prompt(today: NaiveDate, remembered_partner: Option<&PartnerRecord>) -> String {
    let mut prompt = format!(
        "{}\n\nToday is {}. Forecasts are available from today up to {} days ahead.",
        ASSISTANT_BRIEF,
        today.format("%A, %Y-%m-%d"),
        FORECAST_HORIZON_DAYS
    );

    if let Some(partner) = remembered_partner {
        prompt.push_str(&format!(
            "\nMost recently discussed partner: {} ({}), ID {}.",
            partner.name,
            partner.location(),
            partner.id
        ));
    }

    prompt
}

/// Messages for the first model call of a turn.
pub fn initial_messages<'a>(
    system: String,
    window: impl Iterator<Item = &'a ConversationTurn>,
    utterance: &str,
) -> Vec<LlmMessage> {
    let mut messages = vec![LlmMessage::system(system)];
    messages.extend(window.map(|turn| match turn.role {
        TurnRole::User => LlmMessage::user(turn.text.clone()),
        TurnRole::Assistant => LlmMessage::assistant(turn.text.clone()),
    }));
    messages.push(LlmMessage::user(utterance));
    messages
}
