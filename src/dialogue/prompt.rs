//! Persona prompts and message assembly for the language model.

use crate::providers::ChatMessage;
use crate::session::{InterviewParams, Speaker, Turn};

use super::QuestionInjection;

fn interview_context(params: &InterviewParams) -> String {
    let mut context = format!(
        "a {} level interview for a {} position, focused on {}",
        params.level, params.role, params.topic
    );
    if let Some(company) = &params.company {
        context.push_str(&format!(", on behalf of {}", company));
    }
    context
}

/// System prompt for scripted mode: the model only voices injected questions
pub fn scripted_persona(params: &InterviewParams) -> String {
    format!(
        "You are a professional, friendly interviewer conducting {context}. \
         The candidate's name is {name}. Your replies are spoken aloud, so use plain \
         conversational sentences with no lists, markup or emojis.\n\
         You will be given the exact question to ask next. Speak only that injected \
         content: you may open with one short, neutral acknowledgement of the \
         candidate's previous answer, then ask the injected question word for word. \
         Never invent your own questions, never answer them, and never give feedback \
         on the candidate's answers.",
        context = interview_context(params),
        name = params.user_name,
    )
}

/// System prompt for free-form mode, including the termination contract
pub fn free_form_persona(params: &InterviewParams, terminal_phrase: &str, max_turns: usize) -> String {
    format!(
        "You are a professional, friendly interviewer conducting {context}. \
         The candidate's name is {name}. Your replies are spoken aloud, so keep each \
         one to a few plain conversational sentences with no lists, markup or emojis.\n\
         Ask exactly one question per reply and adapt follow-ups to the candidate's \
         answers. After about {max_turns} questions, close the interview.\n\
         When you close the interview, your final message must begin with exactly \
         \"{phrase}\" followed by a brief thank-you. Never use that phrase at any \
         other time.",
        context = interview_context(params),
        name = params.user_name,
        max_turns = max_turns,
        phrase = terminal_phrase,
    )
}

pub fn history_messages(history: &[Turn]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|turn| match turn.speaker {
            Speaker::User => ChatMessage::user(turn.text.clone()),
            Speaker::Agent => ChatMessage::assistant(turn.text.clone()),
        })
        .collect()
}

fn kickoff(user_name: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "(The candidate {} has joined the call. Begin the interview.)",
        user_name
    ))
}

/// Messages asking the model to voice one injected question
pub fn scripted_messages(
    persona: &str,
    params: &InterviewParams,
    history: &[Turn],
    question: &QuestionInjection,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(persona)];
    messages.extend(history_messages(history));

    let opening = !history.iter().any(|t| t.speaker == Speaker::User);
    if opening {
        messages.push(kickoff(&params.user_name));
    }

    let instruction = if opening {
        format!(
            "Greet {} in one short sentence, then ask question {} of {}: \"{}\"",
            params.user_name, question.index, question.total, question.text
        )
    } else {
        format!(
            "Ask question {} of {}: \"{}\"",
            question.index, question.total, question.text
        )
    };
    messages.push(ChatMessage::system(instruction));
    messages
}

/// Messages for the next free-form turn; `force_close` steers to termination
pub fn free_form_messages(
    persona: &str,
    params: &InterviewParams,
    history: &[Turn],
    terminal_phrase: &str,
    force_close: bool,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(persona)];
    messages.extend(history_messages(history));

    if !history.iter().any(|t| t.speaker == Speaker::User) {
        messages.push(kickoff(&params.user_name));
    }

    if force_close {
        messages.push(ChatMessage::system(format!(
            "The interview time is up. Do not ask another question. Begin your reply \
             with exactly \"{}\" and thank the candidate.",
            terminal_phrase
        )));
    }
    messages
}

/// Prompt for the one-off question-set generation call
pub fn question_set_messages(params: &InterviewParams, count: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You prepare interview question sets. Reply with a JSON array of strings \
             and nothing else.",
        ),
        ChatMessage::user(format!(
            "Write {} spoken interview questions for {}. Each question must stand on \
             its own and be answerable aloud in under two minutes.",
            count,
            interview_context(params)
        )),
    ]
}
