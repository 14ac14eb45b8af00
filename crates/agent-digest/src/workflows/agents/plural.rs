//! Russian count agreement for digest subject lines.

use super::domain::DigestType;

/// Grammatical number selected by a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountForm {
    /// 1, 21, 101 ...
    One,
    /// 2-4, 22-24 ...
    Few,
    /// 0, 5-20, 25-30, 111 ...
    Many,
}

impl CountForm {
    pub fn of(count: usize) -> Self {
        let last = count % 10;
        let last_two = count % 100;

        if last == 1 && last_two != 11 {
            Self::One
        } else if (2..=4).contains(&last) && !(11..=19).contains(&last_two) {
            Self::Few
        } else {
            Self::Many
        }
    }
}

/// Localized count phrase plus the noun handed to the mail template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountPhrase {
    /// "5 новых вакансий"
    pub phrase: String,
    pub noun: &'static str,
}

pub fn count_phrase(digest_type: DigestType, count: usize) -> CountPhrase {
    match digest_type {
        DigestType::Vacancies => vacancy_phrase(count, "вакансия"),
        // Singular noun differs from the vacancy digest.
        DigestType::Universal => vacancy_phrase(count, "ваканся"),
        DigestType::Cv => cv_phrase(count),
    }
}

fn vacancy_phrase(count: usize, singular_noun: &'static str) -> CountPhrase {
    let (adjective, subject_noun, noun) = match CountForm::of(count) {
        CountForm::One => ("новая", "вакансия", singular_noun),
        CountForm::Few => ("новые", "вакансии", "вакансии"),
        CountForm::Many => ("новых", "вакансий", "вакансий"),
    };
    CountPhrase {
        phrase: format!("{count} {adjective} {subject_noun}"),
        noun,
    }
}

/// "резюме" does not decline; only the adjective agrees, and only the last digit
/// is checked (11 reads as singular).
fn cv_phrase(count: usize) -> CountPhrase {
    let adjective = if count % 10 == 1 { "новое" } else { "новых" };
    CountPhrase {
        phrase: format!("{count} {adjective} резюме"),
        noun: "резюме",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_form_follows_last_two_digits() {
        let cases = [
            (0, CountForm::Many),
            (1, CountForm::One),
            (2, CountForm::Few),
            (4, CountForm::Few),
            (5, CountForm::Many),
            (11, CountForm::Many),
            (12, CountForm::Many),
            (19, CountForm::Many),
            (21, CountForm::One),
            (22, CountForm::Few),
            (101, CountForm::One),
            (111, CountForm::Many),
            (114, CountForm::Many),
        ];
        for (count, expected) in cases {
            assert_eq!(CountForm::of(count), expected, "count {count}");
        }
    }

    #[test]
    fn vacancy_phrases_agree_with_count() {
        assert_eq!(
            count_phrase(DigestType::Vacancies, 1).phrase,
            "1 новая вакансия"
        );
        assert_eq!(
            count_phrase(DigestType::Vacancies, 3).phrase,
            "3 новые вакансии"
        );
        assert_eq!(
            count_phrase(DigestType::Vacancies, 11).phrase,
            "11 новых вакансий"
        );
        assert_eq!(
            count_phrase(DigestType::Vacancies, 21).phrase,
            "21 новая вакансия"
        );
        assert_eq!(count_phrase(DigestType::Vacancies, 5).noun, "вакансий");
    }

    #[test]
    fn cv_phrase_only_checks_last_digit() {
        assert_eq!(count_phrase(DigestType::Cv, 1).phrase, "1 новое резюме");
        assert_eq!(count_phrase(DigestType::Cv, 11).phrase, "11 новое резюме");
        assert_eq!(count_phrase(DigestType::Cv, 2).phrase, "2 новых резюме");
        assert_eq!(count_phrase(DigestType::Cv, 2).noun, "резюме");
    }

    #[test]
    fn universal_uses_vacancy_rule_with_own_singular_noun() {
        let one = count_phrase(DigestType::Universal, 1);
        assert_eq!(one.phrase, "1 новая вакансия");
        assert_eq!(one.noun, "ваканся");
        assert_eq!(count_phrase(DigestType::Universal, 2).noun, "вакансии");
    }
}
