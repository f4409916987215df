use slackforce_core::{Part, Role, Turn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Author {
    Human,
    Bot,
}

impl Author {
    pub fn role(self) -> Role {
        match self {
            Self::Human => Role::User,
            Self::Bot => Role::Model,
        }
    }
}

/// One message of a chat thread, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorMessage {
    pub author: Author,
    pub text: String,
}

impl PriorMessage {
    pub fn human(text: impl Into<String>) -> Self {
        Self { author: Author::Human, text: text.into() }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self { author: Author::Bot, text: text.into() }
    }
}

/// Thread history split into the seeded turns and the current query.
#[derive(Clone, Debug, PartialEq)]
pub struct HydratedThread {
    pub history: Vec<Turn>,
    pub query: String,
}

impl HydratedThread {
    pub fn query_only(query: impl Into<String>) -> Self {
        Self { history: Vec::new(), query: query.into() }
    }
}

/// Maps a chat thread onto model turns. The newest message becomes the query and is
/// left out of the history. Returns `None` for an empty thread.
pub fn hydrate_thread(mut messages: Vec<PriorMessage>) -> Option<HydratedThread> {
    let newest = messages.pop()?;
    let history = messages
        .into_iter()
        .map(|message| Turn::new(message.author.role(), vec![Part::text(message.text)]))
        .collect();

    Some(HydratedThread { history, query: newest.text })
}
