/// Talk namespace prefix → subject namespace prefix. First match wins.
const TALK_PREFIXES: &[(&str, &str)] = &[
    ("Обсуждение:", ""),
    ("Обсуждение участника:", "Участник:"),
    ("Обсуждение Википедии:", "Википедия:"),
    ("Обсуждение шаблона:", "Шаблон:"),
    ("Обсуждение категории:", "Категория:"),
    ("Обсуждение портала:", "Портал:"),
];

/// Rewrite a talk page title into the title of the page it discusses.
/// Titles outside the known talk namespaces are returned unchanged.
pub fn detalkify(title: &str) -> String {
    TALK_PREFIXES
        .iter()
        .find_map(|(talk, subject)| {
            title
                .strip_prefix(talk)
                .map(|rest| format!("{subject}{rest}"))
        })
        .unwrap_or_else(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_talk_maps_to_main_namespace() {
        assert_eq!(detalkify("Обсуждение:Физика"), "Физика");
    }

    #[test]
    fn test_namespaced_talk_maps_to_subject_namespace() {
        assert_eq!(detalkify("Обсуждение участника:Пример"), "Участник:Пример");
        assert_eq!(detalkify("Обсуждение Википедии:Правила"), "Википедия:Правила");
        assert_eq!(detalkify("Обсуждение шаблона:Карточка"), "Шаблон:Карточка");
        assert_eq!(detalkify("Обсуждение категории:Физика"), "Категория:Физика");
        assert_eq!(detalkify("Обсуждение портала:Наука"), "Портал:Наука");
    }

    #[test]
    fn test_non_talk_title_unchanged() {
        assert_eq!(detalkify("Физика"), "Физика");
        assert_eq!(detalkify("Talk:Physics"), "Talk:Physics");
    }

    #[test]
    fn test_only_leading_prefix_is_stripped() {
        assert_eq!(
            detalkify("Обсуждение:Обсуждение:Рекурсия"),
            "Обсуждение:Рекурсия"
        );
    }
}
