mod events;
mod schema;

pub(crate) mod support;
