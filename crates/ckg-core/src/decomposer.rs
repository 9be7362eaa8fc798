//! Logic decomposition
//!
//! Asks the oracle to break a rule, seen through one example case, into
//! atomic "Get ..." / "Check whether ..." steps drawn from the meta
//! operation vocabulary.

use std::fmt::Write as _;

use ckg_retrieval::MetaIndex;

use crate::prompt::{ChatMessage, ChatPrompt, LogicPrompt, PromptKind};

const INSTRUCTIONS: &str = "You are an expert in Java rule checkers. Given a rule description \
and a counterexample test case, perform granular checks to decide whether the test case \
follows the rule. Every granular check is a meta operation that does exactly one thing and \
starts with \"Get ...\" or \"Check whether ...\", such as \"Get the name of method\" or \
\"Check whether the method is static\". Start every check with a number like \"1. \".";

/// Worked decompositions shown before the real request
const FEW_SHOTS: &[(&str, &str, &str)] = &[
    (
        "Avoid concatenating characters as strings in StringBuffer/StringBuilder.append methods.",
        "sb.append(\"a\");",
        "1. Get the name of called method.\n\
         2. Check whether the name is append.\n\
         3. Get the method caller.\n\
         4. Check whether the type of method caller is StringBuilder/StringBuffer class type.\n\
         5. Get the argument list of method.\n\
         6. Get the size of argument list.\n\
         7. Check whether the size of argument list is 1.\n\
         8. Check whether the argument is a string literal.\n\
         9. Get the length of string literal.\n\
         10. Check whether the length of string literal is 1.\n\
         If the called method name is append, the argument is a string literal of length 1 \
         and the caller is a StringBuilder or StringBuffer, this test case violates the rule.",
    ),
    (
        "The abstract class (interfaces, classes with super classes or implemented interfaces are \
         ignored) should contain at least one abstract method.",
        "public abstract class Foo {}",
        "1. Check whether the class is an interface.\n\
         2. Check whether the class has super classes.\n\
         3. Check whether the class has implemented interfaces.\n\
         4. Check whether the class is abstract.\n\
         5. Get all methods declared in class.\n\
         6. Check whether method is abstract.\n\
         If an abstract class without super classes or implemented interfaces has no abstract \
         method, this test case violates the rule.",
    ),
    (
        "Avoid reassigning a value to a final field.",
        "public class Foo {\n    final int a = 1;\n    int b = 0;\n    a = b;\n}",
        "1. Get the left-hand side operand of the assignment expression.\n\
         2. Check whether the operand is an accessed field.\n\
         3. Check whether the accessed field is final.\n\
         If the left-hand operand of the assignment expression is an accessed final field, this \
         test case violates the rule.",
    ),
];

#[derive(Debug, Clone, Default)]
pub struct LogicDecomposer {
    vocabulary: Vec<String>,
}

impl LogicDecomposer {
    #[must_use]
    pub fn new(vocabulary: Vec<String>) -> Self {
        Self { vocabulary }
    }

    /// Use the meta catalog's operation names as the step vocabulary
    #[must_use]
    pub fn from_meta(meta: &MetaIndex) -> Self {
        Self::new(meta.operation_names().map(str::to_string).collect())
    }

    #[inline]
    #[must_use]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Full decomposition prompt: instructions, vocabulary, few-shots, request
    #[must_use]
    pub fn prompt(&self, rule_description: &str, test_case: &str) -> ChatPrompt {
        let mut system = String::from(INSTRUCTIONS);
        if !self.vocabulary.is_empty() {
            system.push_str("\n\nSelect from these operation sentences:\n");
            for (i, op) in self.vocabulary.iter().enumerate() {
                let _ = writeln!(system, "{}. {}", i + 1, op);
            }
        }

        let mut prompt =
            ChatPrompt::new(PromptKind::Logic).with_message(ChatMessage::system(system));
        for (description, case, answer) in FEW_SHOTS {
            let request = LogicPrompt {
                rule_description: description,
                test_case: case,
            };
            prompt = prompt
                .with_message(ChatMessage::user(request.user_text()))
                .with_message(ChatMessage::assistant(*answer));
        }
        let request = LogicPrompt {
            rule_description,
            test_case,
        };
        prompt.with_message(ChatMessage::user(request.user_text()))
    }
}

/// Numbered lines of a decomposition, numbering removed.
///
/// Prose lines (the closing "If ... violates the rule" summary) are dropped.
#[must_use]
pub fn parse_steps(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
        .map(|line| {
            line.trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')', ':'])
                .trim()
                .to_string()
        })
        .filter(|step| !step.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn steps_keep_numbered_lines_only() {
        let response = "Here is the breakdown:\n\
                        1. Get the value of the literal.\n  \
                        2.  Check whether the literal starts with 0.\n\
                        If it does, the case violates the rule.\n\
                        3.";
        assert_eq!(
            parse_steps(response),
            vec![
                "Get the value of the literal.".to_string(),
                "Check whether the literal starts with 0.".to_string(),
            ]
        );
    }

    #[test]
    fn steps_without_space_after_number() {
        let steps = parse_steps("1.Get the image\n2)Check the prefix\n3 Report it\n4.");
        assert_eq!(steps, vec!["Get the image", "Check the prefix", "Report it"]);
    }

    #[test]
    fn prompt_layout() {
        let decomposer = LogicDecomposer::new(vec!["Get the name of class".into()]);
        let prompt = decomposer.prompt("No octal", "int i = 012;");

        assert_eq!(prompt.kind, PromptKind::Logic);
        assert_eq!(prompt.messages.len(), 2 + FEW_SHOTS.len() * 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert!(prompt.messages[0].content.contains("1. Get the name of class"));
        assert_eq!(prompt.messages[2].role, Role::Assistant);
        let last = prompt.last_user_text().unwrap();
        assert!(last.contains("rule description: No octal"));
        assert!(last.contains("int i = 012;"));
    }
}
