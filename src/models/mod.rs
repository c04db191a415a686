pub mod conversation;
pub mod message;
pub mod participant;

pub use conversation::{Conversation, ConversationKind};
pub use message::{Message, MessageKind};
pub use participant::{Participant, ParticipantRole};

/// Page request for list endpoints. Pages are 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
    pub per_page: i64,
}

pub const DEFAULT_PER_PAGE: i64 = 50;
pub const MAX_PER_PAGE: i64 = 100;

impl Page {
    pub fn new(number: Option<u32>, per_page: Option<i64>) -> Self {
        let number = number.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        Self { number, per_page }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * self.per_page
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_caps() {
        let page = Page::default();
        assert_eq!(page.number, 1);
        assert_eq!(page.per_page, DEFAULT_PER_PAGE);
        assert_eq!(page.offset(), 0);

        let capped = Page::new(Some(3), Some(10_000));
        assert_eq!(capped.per_page, MAX_PER_PAGE);
        assert_eq!(capped.offset(), 200);

        let floor = Page::new(Some(0), Some(0));
        assert_eq!(floor.number, 1);
        assert_eq!(floor.per_page, 1);
    }
}
