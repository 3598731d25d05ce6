use crate::model::Student;

pub const NAME_TOKEN: &str = "[Name]";
/// Filled by the generator from the value entered while writing; never from stored data.
pub const PERSONALISED_TOKEN: &str = "[personalised information]";
/// Filled by the generator with the formatted assessment score.
pub const SCORE_TOKEN: &str = "[Score]";

/// Replaces every `[Name]` with the student's first name.
///
/// Case-sensitive and single pass: replacement text is not scanned again, and
/// any other bracketed token is left as written.
pub fn substitute(text: &str, student: &Student) -> String {
    text.replace(NAME_TOKEN, &student.first_name)
}

pub fn fill_token(text: &str, token: &str, value: &str) -> String {
    text.replace(token, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> Student {
        Student::new("Ada", "Lovelace")
    }

    #[test]
    fn replaces_every_name_token() {
        assert_eq!(substitute("[Name] got [Name]", &ada()), "Ada got Ada");
    }

    #[test]
    fn stable_once_tokens_are_gone() {
        let once = substitute("Well done [Name].", &ada());
        assert_eq!(substitute(&once, &ada()), once);
    }

    #[test]
    fn token_match_is_case_sensitive() {
        assert_eq!(substitute("[name] and [NAME]", &ada()), "[name] and [NAME]");
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(
            substitute("[Name] aims for [personalised information] in [Subject]", &ada()),
            "Ada aims for [personalised information] in [Subject]"
        );
    }

    #[test]
    fn replacement_is_not_rescanned() {
        let odd = Student::new("[Name]", "X");
        assert_eq!(substitute("Hi [Name]!", &odd), "Hi [Name]!");
    }

    #[test]
    fn missing_first_name_substitutes_empty() {
        let s = Student::new("", "Hopper");
        assert_eq!(substitute("[Name] tried.", &s), " tried.");
    }

    #[test]
    fn fill_token_only_touches_the_named_token() {
        let out = fill_token("[Name] scored [Score]", SCORE_TOKEN, "17/20");
        assert_eq!(out, "[Name] scored 17/20");
    }
}
