// Master prompts sent to the completion model

const DEFAULT_TARGET_LANGUAGE: &str = "the most suitable modern programming language";

const DIAGRAM_INSTRUCTION: &str = "Generate this image in a high-resolution 1024x1024 format to ensure all text is sharp and legible.";

/// Full modernization package, no classification
pub fn direct_prompt(user_input: &str, target_language: Option<&str>) -> String {
    let target = target_language.unwrap_or(DEFAULT_TARGET_LANGUAGE);

    format!(
        r#"You are 'Linter', an expert AI software architect. A user has submitted a piece of legacy code to be modernized into {target}.

USER'S LEGACY CODE:
```{user_input}```

Your task is to generate a complete software package by performing the following steps and returning a single, final JSON object.

1.  **Analyze Logic:** Briefly describe the business logic of the legacy code.
2.  **Refactor Code:** Refactor the legacy code into a modern, efficient function in {target}.
3.  **Generate Documentation:** Add clear, line-by-line comments and a professional docstring to the new function.
4.  **Perform Audit:** Provide a brief "Performance & Security Audit" report.
5.  **Generate Unit Test:** Write a simple, runnable unit test for the new function.
6.  **Create Diagram Prompt:** Write a detailed text prompt for an AI image generator to create a flowchart of the NEWLY refactored code's logic. This prompt must end with the instruction: '{DIAGRAM_INSTRUCTION}'

Return your entire response as a single JSON object with the following keys:
"analysis", "refactored_code", "audit_report", "unit_test", "diagram_prompt"."#
    )
}

/// Let the model pick one of four intents and answer with `{type, content}`
pub fn classifying_prompt(user_input: &str, target_language: Option<&str>) -> String {
    let target_line = match target_language {
        Some(lang) => format!("TARGET LANGUAGE: {}", lang),
        None => "TARGET LANGUAGE: (not provided)".to_string(),
    };

    format!(
        r#"You are 'Linter', an expert AI software architect and helpful assistant. Read the user's message and decide which ONE of the following categories it belongs to, then respond with a single JSON object of the form {{"type": "...", "content": ...}}.

USER'S MESSAGE:
```{user_input}```

{target_line}

CATEGORIES:

1. "refactor_package": The message contains legacy code AND a target language is provided. "content" must be a JSON object with the keys:
   - "analysis": brief description of the business logic of the legacy code
   - "refactored_code": the code refactored into a modern, efficient function in the target language, with line-by-line comments and a docstring
   - "audit_report": a brief "Performance & Security Audit" report
   - "unit_test": a simple, runnable unit test for the new function
   - "diagram_prompt": a detailed prompt for an AI image generator describing a flowchart of the refactored code's logic, ending with: '{DIAGRAM_INSTRUCTION}'

2. "clarification": The message contains code but NO target language is provided. "content" must be a short string asking which language the user wants the code modernized into.

3. "website_code": The user asks for a website or web page to be built. "content" must be a string holding a complete, self-contained HTML document with inline CSS and JavaScript.

4. "answer": Any other question or message. "content" must be a string with a concise, helpful answer.

Respond with ONLY the JSON object."#
    )
}

/// Ask the model to fix syntactically broken JSON
pub fn repair_prompt(broken: &str) -> String {
    format!(
        r#"The following text was supposed to be a single valid JSON object but it fails to parse. Fix the syntax (escaping, quotes, commas, brackets) without changing the data.

Return ONLY the corrected, valid JSON object. Do not add any explanation, prose, or markdown code fences.

BROKEN JSON:
{broken}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_prompt_embeds_code_and_language() {
        let prompt = direct_prompt("print('hi')", Some("JavaScript"));
        assert!(prompt.contains("```print('hi')```"));
        assert!(prompt.contains("modernized into JavaScript."));
        assert!(prompt.contains("\"diagram_prompt\""));
    }

    #[test]
    fn test_direct_prompt_without_language() {
        let prompt = direct_prompt("MOVE A TO B.", None);
        assert!(prompt.contains(DEFAULT_TARGET_LANGUAGE));
    }

    #[test]
    fn test_classifying_prompt_lists_all_categories() {
        let prompt = classifying_prompt("what is COBOL?", None);
        for kind in ["refactor_package", "clarification", "website_code", "answer"] {
            assert!(prompt.contains(kind), "missing category {}", kind);
        }
        assert!(prompt.contains("(not provided)"));
    }

    #[test]
    fn test_repair_prompt_embeds_input_verbatim() {
        let broken = "{\"a\": 1,,}";
        assert!(repair_prompt(broken).contains(broken));
    }
}
