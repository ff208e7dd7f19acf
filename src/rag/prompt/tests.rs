use super::*;

#[test]
fn persona_names_the_manual() {
    let prompt = PromptBuilder::new("Aprilia SR125 manual").build("ctx", "q");

    assert!(prompt.starts_with("You are a professional service assistant for the Aprilia SR125 manual."));
}

#[test]
fn context_and_question_are_verbatim() {
    let context = "Torque the rear axle nut to 95 Nm.\n\n  Indented line {braces} kept.";
    let question = "What torque for the rear axle?  ";

    let prompt = PromptBuilder::new("service manual").build(context, question);

    assert!(prompt.contains(&format!("MANUAL CONTEXT:\n{}\n\nUSER QUESTION: ", context)));
    assert!(prompt.contains(&format!("USER QUESTION: {}\n", question)));
}

#[test]
fn grounding_instructions_are_present() {
    let prompt = PromptBuilder::new("service manual").build("ctx", "q");

    assert!(prompt.contains("ONLY from the manual context"));
    assert!(prompt.contains("does not contain the answer"));
    assert!(prompt.contains("not available in the service manual"));
    assert!(prompt.contains("concise and technical"));
    assert!(prompt.ends_with("ANSWER:"));
}

#[test]
fn instructions_follow_the_question() {
    let prompt = PromptBuilder::new("service manual").build("ctx", "q");

    let question_at = prompt.find("USER QUESTION:").expect("question section");
    let instructions_at = prompt.find("INSTRUCTIONS:").expect("instructions section");
    let context_at = prompt.find("MANUAL CONTEXT:").expect("context section");

    assert!(context_at < question_at);
    assert!(question_at < instructions_at);
}
