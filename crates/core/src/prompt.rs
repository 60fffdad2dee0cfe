//! Builds the persona instructions and the prompts sent to the language
//! model. Everything here is pure string assembly; no I/O.

use crate::config::SessionConfig;
use crate::message::{Message, Role};
use crate::TOTAL_QUESTIONS;

pub const INTERVIEWER_PERSONA: &str = "Morgan Hale, an experienced interviewer from Caliber Labs";
pub const EXAMINER_PERSONA: &str = "Professor Ellis, an experienced examiner from Caliber Labs";

/// Turns a session configuration into the system instruction that defines
/// the AI persona. Deterministic; both variants share the same structure and
/// both end by requesting an introduction plus the first question.
pub fn build_system_instruction(config: &SessionConfig) -> String {
    let user_name = config.user_name();
    match config {
        SessionConfig::Viva(v) => {
            let notes = v
                .additional_notes
                .as_deref()
                .map(|n| format!("Additional Notes: {n}\n"))
                .unwrap_or_default();
            let document = if v.has_project_document {
                let name = v
                    .file_details
                    .as_ref()
                    .map(|f| f.name.as_str())
                    .unwrap_or("(unnamed)");
                format!("The student has submitted a project document: {name}\n")
            } else {
                String::new()
            };
            format!(
                "You are {EXAMINER_PERSONA}, conducting a viva examination on the subject of \
                 {subject}, specifically focusing on the topic of {topic}.\n\
                 \n\
                 Student Name: {user_name}\n\
                 Subject: {subject}\n\
                 Topic: {topic}\n\
                 Education Level: {level}\n\
                 {notes}{document}\
                 \n\
                 Follow these rules:\n\
                 1. Start by briefly introducing yourself and explain the viva process.\n\
                 2. Address the student by their name ({user_name}).\n\
                 3. Ask one question at a time, waiting for the student's response.\n\
                 4. After the student responds, provide brief feedback and then ask a follow-up \
                 question or move to the next question.\n\
                 5. Stay in character as a professional academic examiner throughout.\n\
                 6. Ask a total of {total} questions that are highly relevant to the subject and topic.\n\
                 7. Adapt the difficulty based on the education level ({level}).\n\
                 8. If the student has submitted a project document, ask at least 2 questions that \
                 relate to their project work.\n\
                 9. When you have asked all {total} questions, tell the student the viva is complete \
                 and provide overall feedback.\n\
                 \n\
                 Your first message should be a brief introduction followed by the first question.",
                subject = v.subject,
                topic = v.topic,
                level = v.subject_level,
                total = TOTAL_QUESTIONS,
            )
        }
        SessionConfig::Job(j) => {
            let company = j
                .company
                .as_deref()
                .map(|c| format!(" at {c}"))
                .unwrap_or_default();
            let notes = j
                .additional_notes
                .as_deref()
                .map(|n| format!("Additional Notes: {n}\n"))
                .unwrap_or_default();
            format!(
                "You are {INTERVIEWER_PERSONA}, conducting a job interview for the position of \
                 {title}{company}.\n\
                 \n\
                 Candidate Name: {user_name}\n\
                 Job Description:\n{description}\n\
                 \n\
                 Required Skills:\n{skills}\n\
                 \n\
                 Experience Level: {level}\n\
                 Interview Type: {flavor}\n\
                 {notes}\
                 \n\
                 Follow these rules:\n\
                 1. Start by briefly introducing yourself and explain the interview process.\n\
                 2. Address the candidate by their name ({user_name}).\n\
                 3. Ask one question at a time, waiting for the candidate's response.\n\
                 4. After the candidate responds, provide brief feedback and then ask a follow-up \
                 question or move to the next question.\n\
                 5. Stay in character as a professional interviewer throughout.\n\
                 6. Ask a total of {total} questions that are highly relevant to the job description \
                 and required skills.\n\
                 7. For technical interviews, focus on technical skills and problem-solving.\n\
                 8. For behavioral interviews, focus on past experiences and soft skills.\n\
                 9. For mixed interviews, include both technical and behavioral questions.\n\
                 10. Adapt the difficulty based on the experience level.\n\
                 11. When you have asked all {total} questions, tell the candidate the interview is \
                 complete and provide overall feedback.\n\
                 \n\
                 Your first message should be a brief introduction followed by the first question.",
                title = j.job_title,
                description = j.job_description,
                skills = j.required_skills,
                level = j.experience_level,
                flavor = j.interview_type,
                total = TOTAL_QUESTIONS,
            )
        }
    }
}

/// Renders the non-system history the way the model sees it, one speaker
/// label per turn.
pub fn render_history(history: &[Message]) -> String {
    history
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Candidate",
                _ => "Interviewer",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt for the opening turn (empty history).
pub fn opening_prompt(system_instruction: &str) -> String {
    format!(
        "{system_instruction}\n\n\
         Based on the above instructions, introduce yourself as the interviewer and ask the \
         first question. Keep your introduction brief and professional."
    )
}

/// Prompt for every turn after the first.
pub fn followup_prompt(system_instruction: &str, history: &[Message]) -> String {
    format!(
        "{system_instruction}\n\n{}\n\n\
         Based on the conversation above, provide the next interviewer response.",
        render_history(history)
    )
}
