use crate::claude::create_message::types::BetaMessage;

/// A non-streaming `POST /v1/messages` response is the message itself.
pub type CreateMessageResponse = BetaMessage;
