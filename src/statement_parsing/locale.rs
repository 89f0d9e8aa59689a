/// Month names used when parsing textual dates such as `15 janv. 2021`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub name: &'static str,
    short_months: [&'static str; 12],
    long_months: [&'static str; 12],
}

impl Locale {
    pub fn french() -> Self {
        return Self {
            name: "fr",
            short_months: [
                "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.",
                "nov.", "déc.",
            ],
            long_months: [
                "janvier",
                "février",
                "mars",
                "avril",
                "mai",
                "juin",
                "juillet",
                "août",
                "septembre",
                "octobre",
                "novembre",
                "décembre",
            ],
        };
    }

    pub fn english() -> Self {
        return Self {
            name: "en",
            short_months: [
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ],
            long_months: [
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ],
        };
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "fr" | "fr-fr" | "french" => Some(Self::french()),
            "en" | "en-gb" | "en-us" | "english" => Some(Self::english()),
            _ => None,
        }
    }

    /// Month number (1-12) for a short or long month name. Case is ignored and
    /// the trailing period of abbreviations is optional.
    pub fn month_number(&self, token: &str) -> Option<u32> {
        let wanted = token.trim().trim_end_matches('.').to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        self.short_months
            .iter()
            .zip(self.long_months.iter())
            .position(|(short, long)| {
                short.trim_end_matches('.').to_lowercase() == wanted || long.to_lowercase() == wanted
            })
            .map(|idx| idx as u32 + 1)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::french()
    }
}
