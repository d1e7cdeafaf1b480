use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Conversation language. Unknown codes fall back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    En,
    Hi,
    Pa,
}

impl Language {
    pub const ALL: [Self; 3] = [Self::En, Self::Hi, Self::Pa];

    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "hi" => Self::Hi,
            "pa" => Self::Pa,
            _ => Self::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Pa => "pa",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Hi => "हिंदी",
            Self::Pa => "ਪੰਜਾਬੀ",
        }
    }

    /// Preamble sent with every exchange.
    pub fn system_instruction(self) -> &'static str {
        match self {
            Self::En => {
                "You are a helpful job assistance chatbot for PGRKAM (Punjab Government employment portal). You help users with:\n\
                 - Job searching and career advice in Punjab\n\
                 - Resume analysis and improvement\n\
                 - Interview preparation and tips\n\
                 - Government job schemes and opportunities\n\
                 - Skill development recommendations\n\n\
                 Always be encouraging, professional, and provide actionable advice. Focus on opportunities in Punjab and government sector jobs."
            }
            Self::Hi => {
                "आप PGRKAM (पंजाब सरकार रोजगार पोर्टल) के लिए एक सहायक नौकरी सहायता चैटबॉट हैं। आप उपयोगकर्ताओं की मदद करते हैं:\n\
                 - पंजाब में नौकरी खोजना और करियर सलाह\n\
                 - रिज्यूमे विश्लेषण और सुधार\n\
                 - इंटरव्यू की तैयारी और सुझाव\n\
                 - सरकारी नौकरी योजनाएं और अवसर\n\
                 - कौशल विकास की सिफारिशें"
            }
            Self::Pa => {
                "ਤੁਸੀਂ PGRKAM (ਪੰਜਾਬ ਸਰਕਾਰ ਰੁਜ਼ਗਾਰ ਪੋਰਟਲ) ਲਈ ਇੱਕ ਸਹਾਇਕ ਨੌਕਰੀ ਸਹਾਇਤਾ ਚੈਟਬੋਟ ਹੋ। ਤੁਸੀਂ ਉਪਭੋਗਤਾਵਾਂ ਦੀ ਮਦਦ ਕਰਦੇ ਹੋ:\n\
                 - ਪੰਜਾਬ ਵਿੱਚ ਨੌਕਰੀ ਖੋਜਣਾ ਅਤੇ ਕਰੀਅਰ ਸਲਾਹ\n\
                 - ਰਿਜ਼ਿਊਮੇ ਵਿਸ਼ਲੇਸ਼ਣ ਅਤੇ ਸੁਧਾਰ\n\
                 - ਇੰਟਰਵਿਊ ਦੀ ਤਿਆਰੀ ਅਤੇ ਸੁਝਾਅ\n\
                 - ਸਰਕਾਰੀ ਨੌਕਰੀ ਸਕੀਮਾਂ ਅਤੇ ਮੌਕੇ"
            }
        }
    }

    pub fn welcome_message(self) -> &'static str {
        match self {
            Self::En => {
                "Hello! I'm your job assistance chatbot. I can help you with:\n\n\
                 • Finding job opportunities\n\
                 • Analyzing your resume\n\
                 • Preparing for interviews\n\
                 • Career guidance\n\n\
                 How can I assist you today?"
            }
            Self::Hi => {
                "नमस्ते! मैं आपका नौकरी सहायता चैटबॉट हूं। मैं आपकी मदद कर सकता हूं:\n\n\
                 • नौकरी के अवसर खोजने में\n\
                 • आपके रिज्यूमे का विश्लेषण करने में\n\
                 • इंटरव्यू की तैयारी में\n\
                 • करियर गाइडेंस में\n\n\
                 आज मैं आपकी कैसे सहायता कर सकता हूं?"
            }
            Self::Pa => {
                "ਸਤ ਸ੍ਰੀ ਅਕਾਲ! ਮੈਂ ਤੁਹਾਡਾ ਨੌਕਰੀ ਸਹਾਇਤਾ ਚੈਟਬੋਟ ਹਾਂ। ਮੈਂ ਤੁਹਾਡੀ ਮਦਦ ਕਰ ਸਕਦਾ ਹਾਂ:\n\n\
                 • ਨੌਕਰੀ ਦੇ ਮੌਕੇ ਲੱਭਣ ਵਿੱਚ\n\
                 • ਤੁਹਾਡੇ ਰਿਜ਼ਿਊਮੇ ਦਾ ਵਿਸ਼ਲੇਸ਼ਣ ਕਰਨ ਵਿੱਚ\n\
                 • ਇੰਟਰਵਿਊ ਦੀ ਤਿਆਰੀ ਵਿੱਚ\n\
                 • ਕਰੀਅਰ ਗਾਈਡੈਂਸ ਵਿੱਚ\n\n\
                 ਅੱਜ ਮੈਂ ਤੁਹਾਡੀ ਕਿਵੇਂ ਸਹਾਇਤਾ ਕਰ ਸਕਦਾ ਹਾਂ?"
            }
        }
    }

    pub fn input_placeholder(self) -> &'static str {
        match self {
            Self::En => "Ask me about jobs, resume, or interviews...",
            Self::Hi => "नौकरी, रिज्यूमे या इंटरव्यू के बारे में पूछें...",
            Self::Pa => "ਨੌਕਰੀ, ਰਿਜ਼ਿਊਮੇ ਜਾਂ ਇੰਟਰਵਿਊ ਬਾਰੇ ਪੁੱਛੋ...",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Infallible;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_code(code))
    }
}

impl From<String> for Language {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_fall_back_to_english() {
        assert_eq!(Language::from_code("pa"), Language::Pa);
        assert_eq!(Language::from_code(" HI "), Language::Hi);
        assert_eq!(Language::from_code("fr"), Language::En);
        assert_eq!(Language::from_code(""), Language::En);
    }

    #[test]
    fn every_language_has_its_own_texts() {
        for language in Language::ALL {
            assert!(!language.system_instruction().is_empty());
            assert!(!language.welcome_message().is_empty());
            assert!(!language.input_placeholder().is_empty());
        }
        assert_ne!(
            Language::En.welcome_message(),
            Language::Pa.welcome_message()
        );
    }

    #[test]
    fn serde_uses_language_codes() {
        assert_eq!(
            serde_json::to_value(Language::Hi).ok(),
            Some(serde_json::Value::from("hi"))
        );
        let parsed: Result<Language, _> = serde_json::from_str("\"de\"");
        assert_eq!(parsed.ok(), Some(Language::En));
    }
}
