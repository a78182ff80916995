//! Collaborator boundaries: the engine drives the transport, service
//! discovery and the synchronous voice link through these traits and learns
//! about completions via the engine entry points.
//!
//! All methods are non-blocking; a request method returning `Ok` means the
//! request was accepted, the outcome arrives later as an engine input.

use crate::address::DeviceAddress;
use crate::link::LinkParameters;
use crate::{HfpError, Role};

/// Identifier for an established transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportHandle(pub u16);

/// Identifier for an established voice link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VoiceLinkHandle(pub u16);

/// Reliable command channel to the peer (RFCOMM in a classic stack)
pub trait Transport {
    /// Open an outbound channel to the peer on the discovered server channel
    ///
    /// # Errors
    /// Fails if the request cannot be issued
    fn connect(&mut self, remote: DeviceAddress, channel: u8) -> Result<(), HfpError>;

    /// Accept an inbound channel previously announced to the engine
    fn accept(&mut self, handle: TransportHandle);

    /// Decline an inbound channel that cannot be admitted
    fn decline(&mut self, handle: TransportHandle);

    /// Whether a line can be sent on the channel right now
    fn can_send_now(&mut self, handle: TransportHandle) -> bool;

    /// Send one complete command or response line
    ///
    /// # Errors
    /// Fails if the channel cannot take the line
    fn send(&mut self, handle: TransportHandle, line: &[u8]) -> Result<(), HfpError>;

    /// Close the channel
    fn disconnect(&mut self, handle: TransportHandle);
}

/// Service discovery for the peer's command channel
pub trait Discovery {
    /// Query the channel number of the peer service matching `peer_role`
    ///
    /// # Errors
    /// Fails if a query is already running or cannot be issued
    fn query(&mut self, remote: DeviceAddress, peer_role: Role) -> Result<(), HfpError>;
}

/// Synchronous voice channel (SCO/eSCO in a classic stack)
pub trait VoiceLink {
    /// Initiate voice link setup with the given parameters
    ///
    /// # Errors
    /// Fails if the request cannot be issued
    fn setup(&mut self, remote: DeviceAddress, params: LinkParameters) -> Result<(), HfpError>;

    /// Accept an inbound voice link previously announced to the engine
    fn accept(&mut self, handle: VoiceLinkHandle, params: LinkParameters);

    /// Reject an inbound voice link
    fn reject(&mut self, handle: VoiceLinkHandle);

    /// Tear the voice link down
    fn release(&mut self, handle: VoiceLinkHandle);
}

/// Bundle of everything the engine calls out to.
///
/// Engine entry points take one `&mut impl Collaborators`; a blanket impl
/// makes any struct with the four parts usable directly.
pub trait Collaborators {
    /// Command channel implementation
    type Transport: Transport;
    /// Discovery implementation
    type Discovery: Discovery;
    /// Voice link implementation
    type VoiceLink: VoiceLink;
    /// Event receiver
    type Events: crate::event::EventSink;

    /// Access the transport
    fn transport(&mut self) -> &mut Self::Transport;
    /// Access discovery
    fn discovery(&mut self) -> &mut Self::Discovery;
    /// Access the voice link
    fn voice_link(&mut self) -> &mut Self::VoiceLink;
    /// Access the event sink
    fn events(&mut self) -> &mut Self::Events;
}
