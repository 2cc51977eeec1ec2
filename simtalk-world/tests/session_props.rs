//! Property tests for the conversation session state machine.
//!
//! Random sequences of submissions, replies (from either party) and clock
//! jumps must never break the session's bookkeeping.

use proptest::prelude::*;

use simtalk_core::{AgentId, SimTime, TerminationReason};
use simtalk_world::{ConversationSession, SessionEvent, SessionState};

const TIMEOUT: f64 = 30.0;

#[derive(Debug, Clone)]
enum Op {
    Submit,
    Reply { from_first: bool },
    Advance(f64),
    Expire,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Submit),
        3 => any::<bool>().prop_map(|from_first| Op::Reply { from_first }),
        2 => (0.0..20.0f64).prop_map(Op::Advance),
        2 => Just(Op::Expire),
    ]
}

proptest! {
    #[test]
    fn session_bookkeeping_holds(
        a_first in any::<bool>(),
        max_per_agent in 1u32..5,
        ops in prop::collection::vec(arb_op(), 0..60),
    ) {
        let (a, b) = (AgentId::new(), AgentId::new());
        let (mut session, _) = ConversationSession::open(a, b, a_first, SimTime::ZERO);
        let mut now = SimTime::ZERO;
        let mut ended: Option<TerminationReason> = None;
        let mut last_speaker: Option<AgentId> = None;

        for op in ops {
            let before = session.last_activity();
            match op {
                Op::Submit => {
                    session.begin_request(now);
                }
                Op::Reply { from_first } => {
                    let speaker = if from_first { a } else { b };
                    let waiting = session.is_waiting_on(&speaker);
                    let events = session.accept_line(speaker, "x", "line".into(), now, max_per_agent);
                    prop_assert_eq!(waiting, !events.is_empty());
                    if waiting {
                        prop_assert_ne!(last_speaker, Some(speaker), "same agent spoke twice in a row");
                        last_speaker = Some(speaker);
                    }
                    let spoken = events.iter().any(|e| matches!(e, SessionEvent::LineSpoken { .. }));
                    prop_assert_eq!(spoken, waiting);
                }
                Op::Advance(secs) => now = now.plus(secs),
                Op::Expire => {
                    session.check_expiry(now, TIMEOUT, max_per_agent);
                }
            }

            prop_assert!(session.last_activity().as_secs() >= before.as_secs());
            prop_assert!(session.turns_of(&a) <= max_per_agent);
            prop_assert!(session.turns_of(&b) <= max_per_agent);
            prop_assert_eq!(
                session.transcript().len(),
                (session.turns_of(&a) + session.turns_of(&b)) as usize
            );
            prop_assert!(session.turns_of(&a).abs_diff(session.turns_of(&b)) <= 1);

            if let Some(reason) = ended {
                prop_assert_eq!(session.state(), SessionState::Terminated(reason));
            } else if let SessionState::Terminated(reason) = session.state() {
                ended = Some(reason);
            }
        }
    }

    #[test]
    fn replies_are_accepted_only_within_the_timeout(
        wait in 0.0..60.0f64,
    ) {
        let (a, b) = (AgentId::new(), AgentId::new());
        let (mut session, _) = ConversationSession::open(a, b, true, SimTime::ZERO);
        session.begin_request(SimTime::ZERO);

        let now = SimTime::from_secs(wait);
        let expired = session.check_expiry(now, TIMEOUT, 3).is_some();
        prop_assert_eq!(expired, wait > TIMEOUT);

        let accepted = !session.accept_line(a, "A", "hi".into(), now, 3).is_empty();
        prop_assert_eq!(accepted, !expired);
    }
}
