//! Conversation content sent to the model at each repair step.

/// Fixed system instruction. Mandates the body sentinel convention.
pub const SYSTEM_RULES: &str = r#"You fix Python bugs.

STRICT OUTPUT:
Return only the function BODY between <<<PYBODY>>> and <<<END>>>.
No signature, no imports, no comments outside the body, no explanations.

Example:
<<<PYBODY>>>
    if n <= 1:
        return n
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a
<<<END>>>
"#;

/// Builds the per-step user message.
///
/// The previous transcript is the only memory of earlier attempts the
/// model receives.
pub fn build_user_message(step: u32, prompt: &str, baseline_program: &str, last_log: &str) -> String {
    format!(
        "Attempt: {step}\n\
         TASK PROMPT:\n\
         {prompt}\n\
         \n\
         BUGGY solution.py (wrapped):\n\
         {baseline_program}\n\
         \n\
         LAST LOG:\n\
         {last_log}\n\
         \n\
         Return only the function BODY wrapped in <<<PYBODY>>> and <<<END>>>."
    )
}
