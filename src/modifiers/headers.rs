//! Static header modifiers.

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};

use crate::modifiers::{Modifier, ModifierContext, ModifierError};
use crate::routing::view::OutboundDraft;

/// Sets a header on the outbound request, replacing existing values.
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetHeader {
    pub fn new(name: &str, value: &str) -> Result<Self, ModifierError> {
        Ok(Self {
            name: parse_name(name)?,
            value: HeaderValue::from_str(value)
                .map_err(|_| ModifierError::InvalidHeaderValue(name.to_string()))?,
        })
    }
}

#[async_trait]
impl Modifier for SetHeader {
    fn name(&self) -> &'static str {
        "set_header"
    }

    async fn apply(
        &self,
        _ctx: &ModifierContext<'_>,
        draft: &mut OutboundDraft,
    ) -> Result<(), ModifierError> {
        draft.headers.insert(self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Removes every value of a header from the outbound request.
#[derive(Debug, Clone)]
pub struct RemoveHeader {
    name: HeaderName,
}

impl RemoveHeader {
    pub fn new(name: &str) -> Result<Self, ModifierError> {
        Ok(Self {
            name: parse_name(name)?,
        })
    }
}

#[async_trait]
impl Modifier for RemoveHeader {
    fn name(&self) -> &'static str {
        "remove_header"
    }

    async fn apply(
        &self,
        _ctx: &ModifierContext<'_>,
        draft: &mut OutboundDraft,
    ) -> Result<(), ModifierError> {
        draft.headers.remove(&self.name);
        Ok(())
    }
}

fn parse_name(name: &str) -> Result<HeaderName, ModifierError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ModifierError::InvalidHeaderName(name.to_string()))
}
