//! Ordered-rule event classifier.
//!
//! Classification is an explicit list of `(category, predicate)` pairs
//! evaluated top to bottom with first-match-wins semantics. The order of
//! the list is the tie-break: a POST to the login page is `post_login`,
//! never plain `post`, even though both predicates hold.

use crate::models::{Event, EventType};
use crate::parser::ParsedLine;

type RulePredicate = fn(&ParsedLine) -> bool;

fn post_login(fields: &ParsedLine) -> bool {
    fields.is_post() && fields.is_login_page()
}

fn get_login(fields: &ParsedLine) -> bool {
    fields.is_get() && fields.is_login_page()
}

fn get_4xx(fields: &ParsedLine) -> bool {
    fields.is_get() && fields.is_client_error()
}

fn post_4xx(fields: &ParsedLine) -> bool {
    fields.is_post() && fields.is_client_error()
}

fn any_post(fields: &ParsedLine) -> bool {
    fields.is_post()
}

fn any_get(fields: &ParsedLine) -> bool {
    fields.is_get()
}

/// Decision table, in priority order.
const RULES: [(EventType, RulePredicate); 6] = [
    (EventType::PostLogin, post_login),
    (EventType::GetLogin, get_login),
    (EventType::Get4xx, get_4xx),
    (EventType::Post4xx, post_4xx),
    (EventType::Post, any_post),
    (EventType::Get, any_get),
];

fn first_match(fields: &ParsedLine) -> Option<EventType> {
    RULES
        .iter()
        .find(|(_, predicate)| predicate(fields))
        .map(|(event_type, _)| *event_type)
}

/// Classify a single log line.
///
/// With `requested` set to `post_login`, the line yields an event only if
/// it is simultaneously a POST and a login-page request; requesting any
/// other category is a no-op. This filter path is deliberately narrow.
///
/// With no requested category the decision table above applies; a line
/// that is neither GET nor POST produces no event.
pub fn classify(line: &str, requested: Option<EventType>) -> Option<Event> {
    let fields = ParsedLine::parse(line);

    let event_type = match requested {
        Some(EventType::PostLogin) => {
            if post_login(&fields) {
                EventType::PostLogin
            } else {
                return None;
            }
        }
        Some(_) => return None,
        None => first_match(&fields)?,
    };

    Some(fields.into_event(event_type, line))
}

/// Classify a batch of lines, preserving input order in the output.
pub fn classify_lines<I, S>(lines: I, requested: Option<EventType>) -> Vec<Event>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| classify(line.as_ref(), requested))
        .collect()
}
