use serde::Serialize;
use serde_json::Value;

pub const FEEDBACK_ACTION_ID: &str = "feedback";
pub const POSITIVE_FEEDBACK_VALUE: &str = "good-feedback";
pub const NEGATIVE_FEEDBACK_VALUE: &str = "bad-feedback";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackButton {
    pub text: TextObject,
    pub accessibility_label: String,
    pub value: String,
}

impl FeedbackButton {
    pub fn new(label: impl Into<String>, accessibility_label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: TextObject::plain(label),
            accessibility_label: accessibility_label.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextActionElement {
    FeedbackButtons {
        action_id: String,
        positive_button: FeedbackButton,
        negative_button: FeedbackButton,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
    },
    Context {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<TextObject>,
    },
    ContextActions { elements: Vec<ContextActionElement> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Blocks as raw JSON, the shape `chat.stopStream` and `chat.postMessage` take.
    pub fn block_values(&self) -> Vec<Value> {
        self.blocks.iter().filter_map(|block| serde_json::to_value(block).ok()).collect()
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: Some(block_id.into()), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: Some(block_id.into()), elements: builder.build() });
        self
    }

    pub fn feedback_buttons(mut self) -> Self {
        self.blocks.push(Block::ContextActions {
            elements: vec![ContextActionElement::FeedbackButtons {
                action_id: FEEDBACK_ACTION_ID.to_string(),
                positive_button: FeedbackButton::new(
                    "Good Response",
                    "Submit positive feedback on this response",
                    POSITIVE_FEEDBACK_VALUE,
                ),
                negative_button: FeedbackButton::new(
                    "Bad Response",
                    "Submit negative feedback on this response",
                    NEGATIVE_FEEDBACK_VALUE,
                ),
            }],
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Trailing feedback affordance attached when an answer stream stops.
pub fn feedback_block() -> MessageTemplate {
    MessageBuilder::new("Was this response helpful?").feedback_buttons().build()
}

/// Last-resort message posted when a thread could not be answered at all.
pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(format!(":warning: Something went wrong! ({summary})"))
        .section("assistant.error.v1", |section| {
            section.mrkdwn(format!(":warning: Something went wrong! ({summary})"));
        })
        .context("assistant.error.meta.v1", |context| {
            context.plain(format!("Reference: {correlation_id}"));
        })
        .build()
}
