//! Concentrator-directed event parsing.
//!
//! Tenant and public-IP events originate at controllers or agents but must
//! land on a specific network concentrator instance. The scheduler unwraps
//! just the concentrator UUID and leaves the rest of the payload alone.

use thiserror::Error;

use flotilla_wire::{from_yaml, Event, PublicIpAssigned, TenantAdded, TenantRemoved, WireError};

#[derive(Debug, Error)]
pub(crate) enum RouteError {
    #[error(transparent)]
    Payload(#[from] WireError),

    #[error("event {0} is not concentrator-directed")]
    Unsupported(Event),
}

/// Extract the concentrator UUID an event must be delivered to.
pub(crate) fn concentrator_target(op: Event, payload: &[u8]) -> Result<String, RouteError> {
    match op {
        Event::TenantAdded => {
            let ev: TenantAdded = from_yaml(payload)?;
            Ok(ev.tenant_added.concentrator_uuid)
        }
        Event::TenantRemoved => {
            let ev: TenantRemoved = from_yaml(payload)?;
            Ok(ev.tenant_removed.concentrator_uuid)
        }
        Event::PublicIpAssigned => {
            let ev: PublicIpAssigned = from_yaml(payload)?;
            Ok(ev.public_ip_assigned.concentrator_uuid)
        }
        other => Err(RouteError::Unsupported(other)),
    }
}
