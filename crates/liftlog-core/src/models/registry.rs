//! Runtime dispatch over entity types.
//!
//! The wire format tags every record with an `entityType` string. The registry
//! maps that tag to a codec so the store can serialize, validate and identify
//! payloads without hardcoding any one domain type.

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::{Error, Result};

use super::{BodyMetric, EntityId, SyncEntity, Syncable, WorkoutSession};

/// Per-type capabilities the sync engine needs.
pub trait EntityCodec: Send + Sync {
    /// Discriminator this codec handles
    fn entity_type(&self) -> &'static str;

    /// Decode, validate and re-encode a payload received from the server
    fn normalize(&self, payload: serde_json::Value) -> Result<serde_json::Value>;

    /// Identifier carried inside a payload
    fn payload_id(&self, payload: &serde_json::Value) -> Result<EntityId>;

    /// Owning user recorded inside a payload
    fn payload_owner(&self, payload: &serde_json::Value) -> Result<String>;
}

struct TypedCodec<T>(PhantomData<fn() -> T>);

impl<T: Syncable> TypedCodec<T> {
    fn decode(payload: serde_json::Value) -> Result<T> {
        serde_json::from_value(payload).map_err(|error| Error::InvalidPayload {
            entity_type: T::ENTITY_TYPE.to_string(),
            message: error.to_string(),
        })
    }
}

impl<T: Syncable> EntityCodec for TypedCodec<T> {
    fn entity_type(&self) -> &'static str {
        T::ENTITY_TYPE
    }

    fn normalize(&self, payload: serde_json::Value) -> Result<serde_json::Value> {
        let entity = Self::decode(payload)?;
        entity.validate().map_err(|error| Error::InvalidPayload {
            entity_type: T::ENTITY_TYPE.to_string(),
            message: error.to_string(),
        })?;
        Ok(serde_json::to_value(&entity)?)
    }

    fn payload_id(&self, payload: &serde_json::Value) -> Result<EntityId> {
        Ok(Self::decode(payload.clone())?.id())
    }

    fn payload_owner(&self, payload: &serde_json::Value) -> Result<String> {
        Ok(Self::decode(payload.clone())?.user_id().to_string())
    }
}

/// Registered entity types, keyed by discriminator
pub struct EntityRegistry {
    codecs: HashMap<&'static str, Box<dyn EntityCodec>>,
}

impl EntityRegistry {
    /// Registry with no types; unknown payloads pass through untouched
    #[must_use]
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register `T` under its `ENTITY_TYPE`, replacing any previous codec
    #[must_use]
    pub fn with<T: Syncable>(mut self) -> Self {
        self.codecs
            .insert(T::ENTITY_TYPE, Box::new(TypedCodec::<T>(PhantomData)));
        self
    }

    /// Codec for a discriminator, if registered
    pub fn codec(&self, entity_type: &str) -> Option<&dyn EntityCodec> {
        self.codecs.get(entity_type).map(|codec| &**codec)
    }

    pub fn is_registered(&self, entity_type: &str) -> bool {
        self.codecs.contains_key(entity_type)
    }

    /// Validate and serialize a typed entity for local storage
    pub fn encode<T: Syncable>(&self, entity: &T) -> Result<serde_json::Value> {
        if !self.is_registered(T::ENTITY_TYPE) {
            return Err(Error::InvalidInput(format!(
                "entity type '{}' is not registered",
                T::ENTITY_TYPE
            )));
        }
        entity.validate()?;
        Ok(serde_json::to_value(entity)?)
    }

    /// Decode a stored entity as `T`
    pub fn decode<T: Syncable>(&self, entity: &SyncEntity) -> Result<T> {
        if entity.entity_type != T::ENTITY_TYPE {
            return Err(Error::InvalidInput(format!(
                "entity {} is a '{}', not a '{}'",
                entity.id,
                entity.entity_type,
                T::ENTITY_TYPE
            )));
        }
        TypedCodec::<T>::decode(entity.payload.clone())
    }

    /// Prepare an incoming remote payload for storage.
    ///
    /// Registered types are validated and must carry the same id as the
    /// envelope and belong to `user_id`. Unregistered types are kept as-is so
    /// newer server-side types survive a round trip through older clients.
    pub fn normalize_remote(
        &self,
        user_id: &str,
        entity_type: &str,
        id: EntityId,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let Some(codec) = self.codec(entity_type) else {
            tracing::debug!(entity_type, %id, "Storing payload of unregistered entity type as-is");
            return Ok(payload);
        };

        let payload_id = codec.payload_id(&payload)?;
        if payload_id != id {
            return Err(Error::InvalidPayload {
                entity_type: entity_type.to_string(),
                message: format!("payload id {payload_id} does not match envelope id {id}"),
            });
        }
        let owner = codec.payload_owner(&payload)?;
        if owner != user_id {
            return Err(Error::InvalidPayload {
                entity_type: entity_type.to_string(),
                message: format!("entity {id} belongs to '{owner}', not '{user_id}'"),
            });
        }
        codec.normalize(payload)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::empty().with::<WorkoutSession>().with::<BodyMetric>()
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.codecs.keys().collect();
        types.sort();
        formatter
            .debug_struct("EntityRegistry")
            .field("types", &types)
            .finish()
    }
}
