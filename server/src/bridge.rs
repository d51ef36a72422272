//! Translates session events into outbound packets. Pure data mapping:
//! the network layer resolves the recipient ids to socket addresses, so
//! this boundary is testable without opening a socket.

use crate::session::SessionEvent;
use shared::Packet;

/// An outbound broadcast: everyone in `recipients` receives `packet`.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub room_code: String,
    pub recipients: Vec<u32>,
    pub packet: Packet,
}

/// Maps one session event to the broadcast it implies. Recipients are
/// derived from the event payload itself; an event about an empty room
/// yields an empty recipient list and the caller sends nothing.
pub fn translate(event: SessionEvent) -> Outbound {
    match event {
        SessionEvent::Tick {
            room_code,
            players,
            orbs,
            timer_sec,
            phase,
        } => {
            let recipients = players.iter().map(|p| p.id).collect();
            Outbound {
                room_code,
                recipients,
                packet: Packet::GameUpdate {
                    players,
                    orbs,
                    timer_sec,
                    phase,
                },
            }
        }
        SessionEvent::Tag {
            room_code,
            tagger_id,
            tagger_name,
            tagged_id,
            tagged_name,
            scores,
        } => {
            let recipients = scores.keys().copied().collect();
            Outbound {
                room_code,
                recipients,
                packet: Packet::TagEvent {
                    tagger_id,
                    tagger_name,
                    tagged_id,
                    tagged_name,
                    scores,
                },
            }
        }
        SessionEvent::Ended {
            room_code,
            winner,
            final_scores,
        } => {
            let recipients = final_scores.keys().copied().collect();
            Outbound {
                room_code,
                recipients,
                packet: Packet::GameEnded {
                    winner,
                    final_scores,
                },
            }
        }
    }
}
