// Vector search collection.

use serde::Serialize;
use tracing::debug;

use crate::config::CollectionConfig;
use crate::error::SynthResult;
use crate::expr::Expr;
use crate::template::Resource;
use crate::types::{COLLECTION_LOGICAL_ID, TYPE_COLLECTION};

use super::StackContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionKind {
    #[serde(rename = "VECTORSEARCH")]
    VectorSearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Collection {
    #[serde(skip)]
    pub logical_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "Type")]
    pub kind: CollectionKind,
}

impl Collection {
    /// `https://<id>.<region>.aoss.amazonaws.com`, known once provisioned.
    pub fn endpoint(&self) -> Expr {
        Expr::get_att(&self.logical_id, "CollectionEndpoint")
    }

    /// Endpoint without its scheme; what dependents expect.
    pub fn host(&self) -> Expr {
        Expr::strip_scheme(self.endpoint())
    }

    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }

    pub fn index_pattern(&self) -> String {
        format!("index/{}/*", self.name)
    }

    pub fn collection_pattern(&self) -> String {
        format!("collection/{}*", self.name)
    }
}

pub fn declare(ctx: &mut StackContext, config: &CollectionConfig) -> SynthResult<Collection> {
    let collection = Collection {
        logical_id: COLLECTION_LOGICAL_ID.to_string(),
        name: config.name.clone(),
        description: config.description.clone(),
        kind: CollectionKind::VectorSearch,
    };
    ctx.add_resource(&collection.logical_id, Resource::new(TYPE_COLLECTION, &collection)?);
    debug!(name = %collection.name, "collection declared");
    Ok(collection)
}
