//! Config property handler
//!
//! Properties are predefined by the server: they can be read and updated but
//! never created or deleted.

use super::HandlerError;
use crate::dtrack::models::{config_property_id, ConfigProperty};
use crate::dtrack::DtrackClient;
use crate::sync::index_by;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Desired value of a config property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPropertySpec {
    pub group: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub value: String,
}

impl ConfigPropertySpec {
    pub fn id(&self) -> String {
        config_property_id(&self.group, &self.name)
    }

    pub fn differs_from(&self, property: &ConfigProperty) -> bool {
        property.property_value.as_deref() != Some(self.value.as_str())
            || property.property_type != self.property_type
    }

    pub fn to_property(&self, existing: Option<&ConfigProperty>) -> ConfigProperty {
        ConfigProperty {
            group_name: self.group.clone(),
            property_name: self.name.clone(),
            property_value: Some(self.value.clone()),
            property_type: self.property_type.clone(),
            description: existing.and_then(|p| p.description.clone()),
        }
    }
}

impl From<&ConfigProperty> for ConfigPropertySpec {
    fn from(property: &ConfigProperty) -> Self {
        Self {
            group: property.group_name.clone(),
            name: property.property_name.clone(),
            property_type: property.property_type.clone(),
            value: property.property_value.clone().unwrap_or_default(),
        }
    }
}

pub struct ConfigPropertyHandler<'a> {
    client: &'a DtrackClient,
}

impl<'a> ConfigPropertyHandler<'a> {
    pub fn new(client: &'a DtrackClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<ConfigProperty>> {
        self.client.list_config_properties().await
    }

    pub async fn list_by_id(&self) -> Result<HashMap<String, ConfigProperty>> {
        Ok(index_by(self.list().await?, ConfigProperty::id))
    }

    /// Read a property by id; `None` if the server does not have it
    pub async fn read(&self, id: &str) -> Result<Option<ConfigProperty>> {
        Ok(self.list_by_id().await?.remove(id))
    }

    pub async fn update(&self, spec: &ConfigPropertySpec) -> Result<ConfigProperty> {
        let Some(existing) = self.read(&spec.id()).await? else {
            return Err(HandlerError::NotFound {
                kind: "config property",
                key: spec.id(),
            }
            .into());
        };
        self.update_existing(&existing, spec).await
    }

    pub async fn update_existing(
        &self,
        existing: &ConfigProperty,
        spec: &ConfigPropertySpec,
    ) -> Result<ConfigProperty> {
        let updated = self
            .client
            .update_config_property(&spec.to_property(Some(existing)))
            .await?;
        tracing::info!("Updated config property {}", updated.id());
        Ok(updated)
    }

    pub fn create(&self, _spec: &ConfigPropertySpec) -> Result<ConfigProperty> {
        Err(HandlerError::Unsupported {
            operation: "Creating",
            kind: "config property",
        }
        .into())
    }

    pub fn delete(&self, _id: &str) -> Result<()> {
        Err(HandlerError::Unsupported {
            operation: "Deleting",
            kind: "config property",
        }
        .into())
    }
}
