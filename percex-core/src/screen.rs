use serde::{Deserialize, Serialize};

/// Screens a session moves through
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Intro,
    Trial,
    End,
}

impl Screen {
    pub fn accepts_response(&self) -> bool {
        matches!(self, Screen::Trial)
    }

    pub fn is_intro(&self) -> bool {
        matches!(self, Screen::Intro)
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Screen::End)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Screen::Intro => "screen-intro",
            Screen::Trial => "screen-trial",
            Screen::End => "screen-end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_trial_screen_takes_responses() {
        assert!(!Screen::Intro.accepts_response());
        assert!(Screen::Trial.accepts_response());
        assert!(!Screen::End.accepts_response());
        assert_eq!(Screen::default(), Screen::Intro);
    }
}
