use crate::params::push;
use crate::params::push_opt;
use crate::params::Query;
use crate::DatasetRef;
use crate::Error;
use crate::Result;

/// Options of a `Parse` request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseParams {
    /// Key of the parsed frame; `<source>.hex` when unset
    pub destination_key: Option<String>,
    /// Force header detection on or off
    pub header: Option<bool>,
    /// Column separator; auto-detected when unset
    pub separator: Option<char>,
}

impl ParseParams {
    pub fn validate(&self) -> Result<()> {
        if let Some(key) = &self.destination_key {
            if key.trim().is_empty() {
                return Err(Error::InvalidParams("destination_key cannot be blank".into()));
            }
        }
        if let Some(sep) = self.separator {
            if !sep.is_ascii() || sep == '\n' || sep == '\r' || sep == '"' {
                return Err(Error::InvalidParams(format!(
                    "unsupported separator {sep:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn destination_for(
        &self,
        source: &DatasetRef,
    ) -> String {
        self.destination_key
            .clone()
            .unwrap_or_else(|| format!("{}.hex", source.key()))
    }

    pub(crate) fn to_query(
        &self,
        source: &DatasetRef,
    ) -> Query {
        let mut query = Query::new();
        push(&mut query, "source_key", source.key());
        push(&mut query, "destination_key", self.destination_for(source));
        push_opt(&mut query, "header", self.header.map(|h| h as u8));
        push_opt(&mut query, "separator", self.separator.map(|c| c as u32));
        query
    }
}
