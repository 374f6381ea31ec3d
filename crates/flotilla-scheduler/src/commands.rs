//! Relay-command parsing.
//!
//! RESTART, STOP, DELETE, and EVACUATE need no placement: the controller
//! already names the agent that owns the instance. Only that routing UUID
//! (plus the instance UUID for logging) is pulled out of the payload.

use thiserror::Error;

use flotilla_wire::{
    from_yaml, Command, DeleteCommand, EvacuateCommand, RestartCommand, StopCommand, WireError,
};

#[derive(Debug, Error)]
pub(crate) enum RelayError {
    #[error(transparent)]
    Payload(#[from] WireError),

    #[error("command {0} carries no relay target")]
    Unsupported(Command),
}

/// Extract `(instance_uuid, workload_agent_uuid)` from a relay command.
/// EVACUATE has no instance; its first element is empty.
pub(crate) fn relay_target(op: Command, payload: &[u8]) -> Result<(String, String), RelayError> {
    match op {
        Command::Restart => {
            let cmd: RestartCommand = from_yaml(payload)?;
            Ok((cmd.restart.instance_uuid, cmd.restart.workload_agent_uuid))
        }
        Command::Stop => {
            let cmd: StopCommand = from_yaml(payload)?;
            Ok((cmd.stop.instance_uuid, cmd.stop.workload_agent_uuid))
        }
        Command::Delete => {
            let cmd: DeleteCommand = from_yaml(payload)?;
            Ok((cmd.delete.instance_uuid, cmd.delete.workload_agent_uuid))
        }
        Command::Evacuate => {
            let cmd: EvacuateCommand = from_yaml(payload)?;
            Ok((String::new(), cmd.evacuate.workload_agent_uuid))
        }
        other => Err(RelayError::Unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_names_instance_and_agent() {
        let payload = b"restart:\n  instance_uuid: inst-1\n  workload_agent_uuid: cn-4\n";
        let (instance, agent) = relay_target(Command::Restart, payload).unwrap();
        assert_eq!(instance, "inst-1");
        assert_eq!(agent, "cn-4");
    }

    #[test]
    fn stop_and_delete_share_the_shape() {
        let stop = b"stop:\n  instance_uuid: inst-2\n  workload_agent_uuid: cn-5\n";
        assert_eq!(
            relay_target(Command::Stop, stop).unwrap(),
            ("inst-2".to_string(), "cn-5".to_string())
        );

        let delete = b"delete:\n  instance_uuid: inst-3\n  workload_agent_uuid: cn-6\n";
        assert_eq!(
            relay_target(Command::Delete, delete).unwrap(),
            ("inst-3".to_string(), "cn-6".to_string())
        );
    }

    #[test]
    fn evacuate_has_no_instance() {
        let payload = b"evacuate:\n  workload_agent_uuid: cn-7\n";
        let (instance, agent) = relay_target(Command::Evacuate, payload).unwrap();
        assert!(instance.is_empty());
        assert_eq!(agent, "cn-7");
    }

    #[test]
    fn missing_agent_field_yields_empty_target() {
        let payload = b"stop:\n  instance_uuid: inst-2\n";
        let (_, agent) = relay_target(Command::Stop, payload).unwrap();
        assert!(agent.is_empty());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(relay_target(Command::Restart, b"restart: [").is_err());
    }

    #[test]
    fn start_is_not_a_relay_command() {
        assert!(matches!(
            relay_target(Command::Start, b""),
            Err(RelayError::Unsupported(Command::Start))
        ));
    }
}
