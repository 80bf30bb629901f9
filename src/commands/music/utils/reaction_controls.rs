use serenity::all::ReactionType;

/// Volume step applied by the volume reactions, in percent.
pub const VOLUME_STEP: i64 = 10;

/// Transport controls exposed as emoji reactions on the now-playing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionControl {
    PlayPause,
    Skip,
    Stop,
    VolumeDown,
    VolumeUp,
}

impl ReactionControl {
    /// Every control, in the order the reactions are seeded.
    pub const ALL: [ReactionControl; 5] = [
        ReactionControl::PlayPause,
        ReactionControl::Skip,
        ReactionControl::Stop,
        ReactionControl::VolumeDown,
        ReactionControl::VolumeUp,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            ReactionControl::PlayPause => "⏯️",
            ReactionControl::Skip => "⏭️",
            ReactionControl::Stop => "⏹️",
            ReactionControl::VolumeDown => "🔉",
            ReactionControl::VolumeUp => "🔊",
        }
    }

    pub fn reaction(self) -> ReactionType {
        ReactionType::Unicode(self.emoji().to_string())
    }

    /// Map a unicode emoji back to its control. Clients sometimes drop the
    /// variation selector, so both spellings are accepted.
    pub fn from_emoji(emoji: &str) -> Option<Self> {
        let bare = emoji.trim_end_matches('\u{FE0F}');
        Self::ALL
            .into_iter()
            .find(|control| control.emoji().trim_end_matches('\u{FE0F}') == bare)
    }

    pub fn from_reaction(reaction: &ReactionType) -> Option<Self> {
        match reaction {
            ReactionType::Unicode(emoji) => Self::from_emoji(emoji),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::all::EmojiId;
    use test_case::test_case;

    #[test_case("⏯️", ReactionControl::PlayPause ; "play pause")]
    #[test_case("⏯", ReactionControl::PlayPause ; "play pause without selector")]
    #[test_case("⏭️", ReactionControl::Skip ; "skip")]
    #[test_case("⏹", ReactionControl::Stop ; "stop without selector")]
    #[test_case("🔉", ReactionControl::VolumeDown ; "volume down")]
    #[test_case("🔊", ReactionControl::VolumeUp ; "volume up")]
    fn emoji_maps_to_control(emoji: &str, expected: ReactionControl) {
        assert_eq!(ReactionControl::from_emoji(emoji), Some(expected));
    }

    #[test]
    fn every_control_round_trips_through_its_reaction() {
        for control in ReactionControl::ALL {
            assert_eq!(
                ReactionControl::from_reaction(&control.reaction()),
                Some(control)
            );
        }
    }

    #[test]
    fn unrelated_reactions_are_ignored() {
        assert_eq!(ReactionControl::from_emoji("👍"), None);
        let custom = ReactionType::Custom {
            animated: false,
            id: EmojiId::new(42),
            name: Some("skip".to_string()),
        };
        assert_eq!(ReactionControl::from_reaction(&custom), None);
    }
}
