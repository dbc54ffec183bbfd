//! One simulated device: a link state machine on one end of the cable.

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use tether_core::NameBuffer;
use tether_link::{
    ConfirmInput, LinkPort, LinkSession, LinkStateMachine, TracingRender, WaitPolicy,
};

pub struct Device<I> {
    pub label: &'static str,
    pub name: NameBuffer,
    pub input: I,
}

impl<I> Device<I>
where
    I: ConfirmInput + Send,
{
    pub fn new(label: &'static str, name: &str, input: I) -> Result<Self> {
        let name = NameBuffer::try_from(name)
            .with_context(|| format!("invalid name for device {label}"))?;
        Ok(Self { label, name, input })
    }

    /// Run the link session until Done, or until shutdown.
    pub async fn run(
        self,
        port: LinkPort,
        policy: WaitPolicy,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<Option<LinkSession>> {
        let label = self.label;
        tracing::info!(
            device = label,
            port = port.id().as_str(),
            name = hex::encode(self.name.as_bytes()),
            "device powered on"
        );

        let mut machine = LinkStateMachine::new(
            label,
            port,
            self.input,
            TracingRender::new(label),
            self.name,
        )
        .with_policy(policy);

        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!(device = label, "device shutting down");
                Ok(None)
            }
            r = machine.run() => {
                let session = r.with_context(|| format!("device {label} lost its link"))?;
                Ok(Some(session))
            }
        }
    }
}
