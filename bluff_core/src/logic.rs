use crate::card::{Deck, Rank};
use crate::config::{DisconnectPolicy, SessionConfig};
use crate::error::{GameError, InvalidMoveReason};
use crate::message::{Envelope, SessionEvent};
use crate::state::*;
use crate::window::ChallengeOutcome;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

// --- 核心游戏流程函数 ---
//
// 所有操作都是同步的，返回需要广播的事件列表，由协调者负责发送。
// 出错时不修改任何状态。

impl GameSession {
    pub fn new(config: SessionConfig) -> Result<Self, GameError> {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// 固定随机种子，洗牌结果可复现
    pub fn with_seed(config: SessionConfig, seed: u64) -> Result<Self, GameError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SessionConfig, rng: StdRng) -> Result<Self, GameError> {
        config.validate()?;
        Ok(GameSession {
            id: Uuid::new_v4(),
            config,
            seats: Vec::new(),
            next_seat_id: 0,
            round_rank: None,
            turn_cursor: 0,
            turn_serial: 0,
            acted: Vec::new(),
            live_claim: None,
            discard: Vec::new(),
            phase: GamePhase::WaitingForPlayers,
            rng,
        })
    }

    /// 玩家入座
    ///
    /// 座位凑满 `seats_required` 后立即开局：洗牌、发牌、轮到第一个座位。
    pub fn join(&mut self) -> Result<(SeatId, Vec<Envelope>), GameError> {
        if self.phase != GamePhase::WaitingForPlayers {
            return Err(GameError::SessionFull);
        }

        let id = SeatId(self.next_seat_id);
        self.next_seat_id += 1;
        self.seats.push(PlayerSeat::new(id));
        info!(session = %self.id, seat = %id, "玩家入座 ({}/{})", self.seats.len(), self.config.seats_required);

        let mut events = vec![Envelope::all(SessionEvent::PlayerJoined { seat: id })];
        if self.seats.len() >= self.config.seats_required {
            info!(session = %self.id, "座位已满，游戏开始");
            self.turn_cursor = 0;
            self.deal_round(&mut events);
            self.begin_turn(&mut events);
        }
        Ok((id, events))
    }

    /// 处理出牌声明
    ///
    /// 只有轮到的座位、且当前没有待结算的声明时才接受。
    /// 成功后牌立即离开手牌，进入质疑窗口阶段。
    pub fn submit_claim(&mut self, seat: SeatId, actual: usize, claimed: usize) -> Result<Vec<Envelope>, GameError> {
        let idx = self.index_of(seat).ok_or(GameError::UnknownSeat(seat))?;
        if self.seats[idx].eliminated {
            return Err(GameError::Eliminated(seat));
        }
        if !self.seats[idx].connected {
            return Err(GameError::SeatDisconnected(seat));
        }
        match self.phase {
            GamePhase::AwaitingClaim(current) if current == seat => {}
            GamePhase::AwaitingClaim(current) => {
                return Err(GameError::OutOfTurn { seat, expected: Some(current) });
            }
            GamePhase::ChallengeWindow | GamePhase::RoundStart => {
                return Err(GameError::OutOfTurn { seat, expected: None });
            }
            GamePhase::WaitingForPlayers | GamePhase::GameOver { .. } => return Err(GameError::NotRunning),
        }
        let rank = self.round_rank.ok_or(GameError::NotRunning)?;

        if claimed == 0 {
            return Err(InvalidMoveReason::ZeroClaim.into());
        }
        let fake = claimed.checked_sub(actual).ok_or(InvalidMoveReason::CountMismatch)?;

        let held = self.seats[idx].matching_count(rank);
        if held < actual {
            return Err(InvalidMoveReason::NotEnoughMatching { needed: actual, held }.into());
        }
        let held = self.seats[idx].disguisable_count(rank);
        if held < fake {
            return Err(InvalidMoveReason::NotEnoughToDisguise { needed: fake, held }.into());
        }

        let cards = self.seats[idx].take_cards(rank, actual, fake);
        self.acted[idx] = true;
        self.live_claim = Some(Claim {
            author: seat,
            rank,
            actual_count: actual,
            claimed_count: claimed,
            cards,
        });
        self.phase = GamePhase::ChallengeWindow;
        info!(session = %self.id, seat = %seat, claimed, "玩家宣称打出 {} 张 {}", claimed, rank);
        debug!(session = %self.id, seat = %seat, actual, fake, "声明明细");

        Ok(vec![
            Envelope::all(SessionEvent::ClaimMade { seat, claimed_count: claimed }),
            Envelope::seat(seat, SessionEvent::HandUpdated { seat, hand: self.seats[idx].hand.clone() }),
            Envelope::all(SessionEvent::ChallengeWindowOpened {
                accused: seat,
                closes_in_ms: self.config.challenge_window.as_millis() as u64,
            }),
        ])
    }

    /// 该座位此刻能否质疑：窗口打开、未淘汰、在线、且不是出牌者本人
    pub fn can_challenge(&self, seat: SeatId) -> bool {
        if self.phase != GamePhase::ChallengeWindow {
            return false;
        }
        let Some(claim) = &self.live_claim else { return false };
        claim.author != seat && self.seat(seat).is_some_and(|s| s.is_active() && s.connected)
    }

    /// 记录某座位喊了 BLUFF，窗口结束时统一清除
    pub fn latch_challenge(&mut self, seat: SeatId) -> bool {
        if !self.can_challenge(seat) {
            return false;
        }
        if let Some(idx) = self.index_of(seat) {
            self.seats[idx].challenge_requested = true;
        }
        true
    }

    /// 结算质疑窗口
    ///
    /// - 无人质疑：声明成立，牌进入弃牌堆，轮到下一位。
    /// - 有人质疑：说谎则出牌者淘汰，否则质疑者淘汰，随后开始新一轮。
    ///
    /// 每次结算后检查胜负：只剩一人时该玩家获胜；声明成立且出牌者手牌打空时出牌者获胜。
    pub fn resolve_challenge(&mut self, outcome: ChallengeOutcome) -> Vec<Envelope> {
        let mut events = Vec::new();
        if self.phase != GamePhase::ChallengeWindow {
            return events;
        }
        let Some(claim) = self.live_claim.take() else { return events };
        let Some(author_idx) = self.index_of(claim.author) else { return events };
        for seat in &mut self.seats {
            seat.challenge_requested = false;
        }
        self.discard.extend(claim.cards.iter().copied());

        let accuser = match outcome {
            ChallengeOutcome::NoChallenge => None,
            ChallengeOutcome::ChallengedBy(accuser)
                if accuser != claim.author && self.seat(accuser).is_some_and(|s| s.is_active()) =>
            {
                Some(accuser)
            }
            ChallengeOutcome::ChallengedBy(accuser) => {
                warn!(session = %self.id, seat = %accuser, "无效的质疑者，按无人质疑处理");
                None
            }
        };

        let Some(accuser) = accuser else {
            info!(session = %self.id, seat = %claim.author, "无人质疑，声明成立");
            events.push(Envelope::all(SessionEvent::NoChallenge));
            if self.seats[author_idx].hand.is_empty() {
                self.finish(Some(claim.author), &mut events);
                return events;
            }
            self.advance_cursor();
            self.begin_turn(&mut events);
            return events;
        };

        events.push(Envelope::all(SessionEvent::ChallengeRaised {
            accuser,
            accused: claim.author,
            actual_count: claim.actual_count,
            claimed_count: claim.claimed_count,
        }));
        let (loser, reason) = if claim.is_truthful() {
            (accuser, EliminationReason::FalseAccusation)
        } else {
            (claim.author, EliminationReason::CaughtBluffing)
        };
        if let Some(loser_idx) = self.index_of(loser) {
            self.eliminate(loser_idx, reason, &mut events);
        }

        // 只剩一人优先判定；两个条件同时成立时指向的都是出牌者
        if self.check_game_over(&mut events) {
            return events;
        }
        if claim.is_truthful() && self.seats[author_idx].hand.is_empty() {
            self.finish(Some(claim.author), &mut events);
            return events;
        }

        // 结算后本轮结束，从出牌者的下一位开始新一轮
        self.turn_cursor = author_idx;
        self.advance_cursor();
        self.deal_round(&mut events);
        self.begin_turn(&mut events);
        events
    }

    /// 处理断线
    ///
    /// 开局前直接让出座位。对局中按配置淘汰或标记为跳过。
    /// 质疑窗口期间只标记离线，淘汰/跳过由协调者在窗口结束后重放本操作完成。
    pub fn disconnect(&mut self, seat: SeatId) -> Vec<Envelope> {
        let mut events = Vec::new();
        let Some(idx) = self.index_of(seat) else { return events };

        match self.phase {
            GamePhase::WaitingForPlayers => {
                self.seats.remove(idx);
                info!(session = %self.id, seat = %seat, "玩家在开局前离开");
                events.push(Envelope::all(SessionEvent::PlayerLeft { seat }));
                return events;
            }
            GamePhase::GameOver { .. } => return events,
            _ => {}
        }

        self.seats[idx].connected = false;
        if self.seats[idx].eliminated || self.phase == GamePhase::ChallengeWindow {
            return events;
        }

        let on_turn = self.current_seat() == Some(seat);
        match self.config.disconnect_policy {
            DisconnectPolicy::Eliminate => {
                self.eliminate(idx, EliminationReason::Disconnected, &mut events);
                if self.check_game_over(&mut events) {
                    return events;
                }
                if on_turn {
                    self.advance_cursor();
                    self.begin_turn(&mut events);
                }
            }
            DisconnectPolicy::Skip => {
                info!(session = %self.id, seat = %seat, "玩家断线，之后的回合将被跳过");
                if on_turn {
                    self.skip_turn(idx, &mut events);
                } else {
                    self.check_game_over(&mut events);
                }
            }
        }
        events
    }

    /// 轮到的玩家超时未出牌，视为弃权跳过
    pub fn fold_turn(&mut self, seat: SeatId) -> Result<Vec<Envelope>, GameError> {
        if self.current_seat() != Some(seat) {
            return Err(GameError::OutOfTurn { seat, expected: self.current_seat() });
        }
        let idx = self.index_of(seat).ok_or(GameError::UnknownSeat(seat))?;
        info!(session = %self.id, seat = %seat, "出牌超时，跳过");
        let mut events = Vec::new();
        self.skip_turn(idx, &mut events);
        Ok(events)
    }

    // --- 辅助逻辑函数 ---

    /// 新一轮：推进点数，重建牌组，洗牌并发给所有未淘汰的座位
    fn deal_round(&mut self, events: &mut Vec<Envelope>) {
        self.phase = GamePhase::RoundStart;
        let rank = self.round_rank.map_or(Rank::Ace, Rank::next);
        self.round_rank = Some(rank);
        self.live_claim = None;
        self.discard.clear();
        self.acted = vec![false; self.seats.len()];

        Deck::shuffled(self.config.deck, &mut self.rng).deal(&mut self.seats);
        info!(session = %self.id, rank = %rank, "新一轮开始");

        events.push(Envelope::all(SessionEvent::RoundStarted { rank }));
        for seat in self.seats.iter().filter(|s| s.is_active()) {
            events.push(Envelope::seat(seat.id, SessionEvent::HandUpdated { seat: seat.id, hand: seat.hand.clone() }));
        }
    }

    /// 把行动权交给游标处的座位。离线座位自动跳过，本轮所有人都行动过则先开新一轮。
    fn begin_turn(&mut self, events: &mut Vec<Envelope>) {
        loop {
            if self.check_game_over(events) {
                return;
            }
            if self.round_complete() {
                self.deal_round(events);
                continue;
            }
            if !self.seats[self.turn_cursor].is_active() {
                self.advance_cursor();
            }

            let idx = self.turn_cursor;
            let id = self.seats[idx].id;
            if !self.seats[idx].connected {
                self.acted[idx] = true;
                events.push(Envelope::all(SessionEvent::TurnSkipped { seat: id }));
                self.advance_cursor();
                continue;
            }

            self.turn_serial += 1;
            self.phase = GamePhase::AwaitingClaim(id);
            debug!(session = %self.id, seat = %id, "轮到玩家出牌");
            events.push(Envelope::all(SessionEvent::TurnStarted { seat: id }));
            return;
        }
    }

    fn skip_turn(&mut self, idx: usize, events: &mut Vec<Envelope>) {
        self.acted[idx] = true;
        events.push(Envelope::all(SessionEvent::TurnSkipped { seat: self.seats[idx].id }));
        self.advance_cursor();
        self.begin_turn(events);
    }

    fn round_complete(&self) -> bool {
        self.seats.iter().zip(&self.acted).all(|(s, &acted)| acted || !s.is_active())
    }

    /// 游标移到下一个未淘汰的座位，顺序固定不重排
    fn advance_cursor(&mut self) {
        let n = self.seats.len();
        for step in 1..=n {
            let idx = (self.turn_cursor + step) % n;
            if self.seats[idx].is_active() {
                self.turn_cursor = idx;
                return;
            }
        }
    }

    /// 淘汰座位，手牌回收进弃牌堆
    fn eliminate(&mut self, idx: usize, reason: EliminationReason, events: &mut Vec<Envelope>) {
        let seat = &mut self.seats[idx];
        seat.eliminated = true;
        seat.challenge_requested = false;
        self.discard.append(&mut seat.hand);
        let id = seat.id;
        info!(session = %self.id, seat = %id, %reason, "玩家被淘汰");
        events.push(Envelope::all(SessionEvent::SeatEliminated { seat: id, reason }));
    }

    /// 只剩一个未淘汰座位时该座位获胜；所有未淘汰座位都已离线时无人获胜
    fn check_game_over(&mut self, events: &mut Vec<Envelope>) -> bool {
        if matches!(self.phase, GamePhase::GameOver { .. }) {
            return true;
        }
        let active: Vec<&PlayerSeat> = self.seats.iter().filter(|s| s.is_active()).collect();
        let winner = match active.as_slice() {
            [only] => Some(only.id),
            rest if rest.iter().all(|s| !s.connected) => None,
            _ => return false,
        };
        self.finish(winner, events);
        true
    }

    fn finish(&mut self, winner: Option<SeatId>, events: &mut Vec<Envelope>) {
        self.phase = GamePhase::GameOver { winner };
        match winner {
            Some(id) => info!(session = %self.id, winner = %id, "游戏结束"),
            None => info!(session = %self.id, "游戏结束，无人获胜"),
        }
        events.push(Envelope::all(SessionEvent::GameOver { winner }));
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::message::Recipient;
    use proptest::prelude::*;

    fn config(seats: usize) -> SessionConfig {
        SessionConfig { seats_required: seats, turn_timeout: None, ..Default::default() }
    }

    // 辅助函数：凑满座位并开局
    fn started_with(config: SessionConfig, seed: u64) -> GameSession {
        let mut session = GameSession::with_seed(config.clone(), seed).unwrap();
        for _ in 0..config.seats_required {
            session.join().unwrap();
        }
        session
    }

    fn started(seats: usize) -> GameSession {
        started_with(config(seats), 42)
    }

    // 手动换手牌，保持张数不变时牌数守恒依然成立
    fn set_hand(session: &mut GameSession, seat: u32, cards: &[Card]) {
        let idx = session.index_of(SeatId(seat)).unwrap();
        session.seats[idx].hand = cards.to_vec();
    }

    fn events_of(envelopes: &[Envelope]) -> Vec<SessionEvent> {
        envelopes.iter().map(|e| e.event.clone()).collect()
    }

    const A: Card = Card::Ace;
    const K: Card = Card::King;
    const Q: Card = Card::Queen;
    const J: Card = Card::Joker;

    #[test]
    fn test_join_starts_game_when_full() {
        let mut session = GameSession::with_seed(config(4), 1).unwrap();
        for i in 0..3 {
            let (id, events) = session.join().unwrap();
            assert_eq!(id, SeatId(i));
            assert_eq!(events_of(&events), vec![SessionEvent::PlayerJoined { seat: id }]);
        }
        assert!(!session.is_running());

        let (id, events) = session.join().unwrap();
        assert_eq!(id, SeatId(3));
        let events = events_of(&events);
        assert_eq!(events[1], SessionEvent::RoundStarted { rank: Rank::Ace });
        assert_eq!(events.last(), Some(&SessionEvent::TurnStarted { seat: SeatId(0) }));
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(0)));
        assert_eq!(session.accounted_cards(), 20);
        assert!(session.seats().iter().all(|s| s.hand.len() == 5));
    }

    #[test]
    fn test_hands_are_sent_privately() {
        let mut session = GameSession::with_seed(config(2), 3).unwrap();
        session.join().unwrap();
        let (_, events) = session.join().unwrap();
        for envelope in &events {
            if let SessionEvent::HandUpdated { seat, .. } = envelope.event {
                assert_eq!(envelope.to, Recipient::Seat(seat));
            }
        }
    }

    #[test]
    fn test_join_after_start_is_rejected() {
        let mut session = started(2);
        assert_eq!(session.join().unwrap_err(), GameError::SessionFull);
    }

    #[test]
    fn test_scenario_a_claim_removes_cards() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[A, A, K, Q, Q]);

        let events = session.submit_claim(SeatId(0), 2, 3).unwrap();
        assert_eq!(events[0].event, SessionEvent::ClaimMade { seat: SeatId(0), claimed_count: 3 });
        assert_eq!(session.seat(SeatId(0)).unwrap().hand.len(), 2);
        let claim = session.live_claim().unwrap();
        assert_eq!(claim.cards, vec![A, A, K]);
        assert_eq!(claim.fake_count(), 1);
        assert_eq!(session.phase(), &GamePhase::ChallengeWindow);
        assert_eq!(session.accounted_cards(), 20);
    }

    #[test]
    fn test_invalid_claims_do_not_mutate_state() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[A, J, K, Q, Q]);

        let cases = [
            (0, 0, GameError::InvalidMove(InvalidMoveReason::ZeroClaim)),
            (3, 2, GameError::InvalidMove(InvalidMoveReason::CountMismatch)),
            (3, 3, GameError::InvalidMove(InvalidMoveReason::NotEnoughMatching { needed: 3, held: 2 })),
            (0, 4, GameError::InvalidMove(InvalidMoveReason::NotEnoughToDisguise { needed: 4, held: 3 })),
        ];
        for (actual, claimed, expected) in cases {
            assert_eq!(session.submit_claim(SeatId(0), actual, claimed).unwrap_err(), expected);
        }
        assert_eq!(
            session.submit_claim(SeatId(1), 1, 1).unwrap_err(),
            GameError::OutOfTurn { seat: SeatId(1), expected: Some(SeatId(0)) }
        );
        assert_eq!(session.seat(SeatId(0)).unwrap().hand.len(), 5);
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(0)));
        assert!(session.live_claim().is_none());
    }

    #[test]
    fn test_second_claim_rejected_while_window_open() {
        let mut session = started(3);
        set_hand(&mut session, 0, &[A, K, Q, Q, K, A, J]);
        session.submit_claim(SeatId(0), 1, 1).unwrap();
        assert_eq!(
            session.submit_claim(SeatId(0), 1, 1).unwrap_err(),
            GameError::OutOfTurn { seat: SeatId(0), expected: None }
        );
    }

    #[test]
    fn test_scenario_b_liar_is_eliminated() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[A, A, K, Q, Q]);
        session.submit_claim(SeatId(0), 2, 3).unwrap();
        assert!(session.latch_challenge(SeatId(1)));

        let events = events_of(&session.resolve_challenge(ChallengeOutcome::ChallengedBy(SeatId(1))));
        assert_eq!(events[0], SessionEvent::ChallengeRaised {
            accuser: SeatId(1),
            accused: SeatId(0),
            actual_count: 2,
            claimed_count: 3,
        });
        assert_eq!(events[1], SessionEvent::SeatEliminated {
            seat: SeatId(0),
            reason: EliminationReason::CaughtBluffing,
        });
        assert!(session.seat(SeatId(0)).unwrap().eliminated);
        assert!(session.seat(SeatId(1)).unwrap().is_active());
        assert!(session.seats().iter().all(|s| !s.challenge_requested));

        // 结算后开始新一轮，点数推进，从出牌者下一位开始
        assert!(events.contains(&SessionEvent::RoundStarted { rank: Rank::King }));
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(1)));
        assert!(session.seat(SeatId(0)).unwrap().hand.is_empty());
        assert_eq!(session.accounted_cards(), 20);
    }

    #[test]
    fn test_false_accusation_eliminates_accuser() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[A, J, K, Q, Q]);
        session.submit_claim(SeatId(0), 2, 2).unwrap();

        let events = events_of(&session.resolve_challenge(ChallengeOutcome::ChallengedBy(SeatId(2))));
        assert!(events.contains(&SessionEvent::SeatEliminated {
            seat: SeatId(2),
            reason: EliminationReason::FalseAccusation,
        }));
        assert!(session.seat(SeatId(0)).unwrap().is_active());
        assert_eq!(session.active_seat_ids(), vec![SeatId(0), SeatId(1), SeatId(3)]);
    }

    #[test]
    fn test_scenario_c_unchallenged_claim_stands() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[A, A, K, Q, Q]);
        session.submit_claim(SeatId(0), 2, 3).unwrap();

        let events = events_of(&session.resolve_challenge(ChallengeOutcome::NoChallenge));
        assert_eq!(events, vec![SessionEvent::NoChallenge, SessionEvent::TurnStarted { seat: SeatId(1) }]);
        // 打出的牌不会退回
        assert_eq!(session.seat(SeatId(0)).unwrap().hand, vec![Q, Q]);
        assert_eq!(session.discard.len(), 3);
        assert!(session.active_seat_ids().len() == 4);
        assert_eq!(session.accounted_cards(), 20);
    }

    #[test]
    fn test_scenario_e_empty_hand_wins_immediately() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[A]);
        session.submit_claim(SeatId(0), 1, 1).unwrap();

        let events = events_of(&session.resolve_challenge(ChallengeOutcome::NoChallenge));
        assert_eq!(events.last(), Some(&SessionEvent::GameOver { winner: Some(SeatId(0)) }));
        assert_eq!(session.phase(), &GamePhase::GameOver { winner: Some(SeatId(0)) });
        assert_eq!(session.active_seat_ids().len(), 4);
    }

    #[test]
    fn test_empty_hand_wins_after_surviving_challenge() {
        let mut session = started(4);
        set_hand(&mut session, 0, &[J]);
        session.submit_claim(SeatId(0), 1, 1).unwrap();

        session.resolve_challenge(ChallengeOutcome::ChallengedBy(SeatId(3)));
        assert_eq!(session.phase(), &GamePhase::GameOver { winner: Some(SeatId(0)) });
    }

    #[test]
    fn test_last_seat_standing_wins() {
        let mut session = started(2);
        set_hand(&mut session, 0, &[K, K, Q]);
        session.submit_claim(SeatId(0), 0, 1).unwrap();

        let events = events_of(&session.resolve_challenge(ChallengeOutcome::ChallengedBy(SeatId(1))));
        assert_eq!(events.last(), Some(&SessionEvent::GameOver { winner: Some(SeatId(1)) }));
        assert!(!session.is_running());
    }

    #[test]
    fn test_turn_order_skips_eliminated_seat() {
        let mut session = started(4);
        session.disconnect(SeatId(1));
        assert!(session.seat(SeatId(1)).unwrap().eliminated);
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(0)));

        set_hand(&mut session, 0, &[A, K, Q, Q, K]);
        session.submit_claim(SeatId(0), 1, 1).unwrap();
        session.resolve_challenge(ChallengeOutcome::NoChallenge);
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(2)));
    }

    #[test]
    fn test_round_ends_after_every_seat_acts() {
        let mut session = started(3);
        for seat in 0..3 {
            set_hand(&mut session, seat, &[K, Q, A, K, Q, A]);
        }
        for seat in 0..3 {
            assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(seat)));
            session.submit_claim(SeatId(seat), 0, 1).unwrap();
            let events = events_of(&session.resolve_challenge(ChallengeOutcome::NoChallenge));
            if seat == 2 {
                assert!(events.contains(&SessionEvent::RoundStarted { rank: Rank::King }));
            }
        }
        assert_eq!(session.round_rank(), Some(Rank::King));
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(0)));
        assert_eq!(session.accounted_cards(), 20);
    }

    #[test]
    fn test_disconnect_on_turn_with_skip_policy() {
        let config = SessionConfig { disconnect_policy: DisconnectPolicy::Skip, ..config(3) };
        let mut session = started_with(config, 9);

        let events = events_of(&session.disconnect(SeatId(0)));
        assert_eq!(events, vec![
            SessionEvent::TurnSkipped { seat: SeatId(0) },
            SessionEvent::TurnStarted { seat: SeatId(1) },
        ]);
        assert!(session.seat(SeatId(0)).unwrap().is_active());
        assert!(!session.seat(SeatId(0)).unwrap().connected);
        assert_eq!(
            session.submit_claim(SeatId(0), 1, 1).unwrap_err(),
            GameError::SeatDisconnected(SeatId(0))
        );
    }

    #[test]
    fn test_everyone_disconnected_ends_without_winner() {
        let config = SessionConfig { disconnect_policy: DisconnectPolicy::Skip, ..config(2) };
        let mut session = started_with(config, 5);
        session.disconnect(SeatId(1));
        let events = events_of(&session.disconnect(SeatId(0)));
        assert_eq!(events.last(), Some(&SessionEvent::GameOver { winner: None }));
    }

    #[test]
    fn test_disconnect_during_window_only_marks_offline() {
        let mut session = started(3);
        set_hand(&mut session, 0, &[A, K, Q, Q, K, A, J]);
        session.submit_claim(SeatId(0), 1, 1).unwrap();

        assert!(session.disconnect(SeatId(2)).is_empty());
        assert!(!session.can_challenge(SeatId(2)));
        assert!(session.seat(SeatId(2)).unwrap().is_active());

        session.resolve_challenge(ChallengeOutcome::NoChallenge);
        let events = events_of(&session.disconnect(SeatId(2)));
        assert_eq!(events[0], SessionEvent::SeatEliminated {
            seat: SeatId(2),
            reason: EliminationReason::Disconnected,
        });
    }

    #[test]
    fn test_disconnect_before_start_frees_seat() {
        let mut session = GameSession::with_seed(config(2), 1).unwrap();
        let (first, _) = session.join().unwrap();
        let events = events_of(&session.disconnect(first));
        assert_eq!(events, vec![SessionEvent::PlayerLeft { seat: first }]);
        assert!(session.seats().is_empty());
        session.join().unwrap();
        assert!(!session.is_running());
        let (id, _) = session.join().unwrap();
        assert_eq!(id, SeatId(2));
        assert!(session.is_running());
    }

    #[test]
    fn test_fold_turn_passes_to_next_seat() {
        let mut session = started(3);
        assert!(session.fold_turn(SeatId(1)).is_err());
        session.fold_turn(SeatId(0)).unwrap();
        assert_eq!(session.phase(), &GamePhase::AwaitingClaim(SeatId(1)));
    }

    #[test]
    fn test_only_other_active_seats_may_challenge() {
        let mut session = started(3);
        assert!(!session.can_challenge(SeatId(1)));
        set_hand(&mut session, 0, &[A, K, Q, Q, K, A, J]);
        session.submit_claim(SeatId(0), 1, 1).unwrap();
        assert!(!session.can_challenge(SeatId(0)));
        assert!(session.can_challenge(SeatId(1)));
        assert!(!session.can_challenge(SeatId(7)));
    }

    #[test]
    fn test_snapshot_hides_other_hands() {
        let session = started(3);
        let view = session.for_client(Some(SeatId(1)));
        assert_eq!(view.your_hand, session.seat(SeatId(1)).unwrap().hand);
        assert_eq!(view.seats.len(), 3);
        assert_eq!(view.round_rank, Some(Rank::Ace));
    }

    // 按入座顺序循环，`seat` 之后第一个未淘汰的座位
    fn next_active_after(session: &GameSession, seat: SeatId) -> Option<SeatId> {
        let seats = session.seats();
        let start = session.index_of(seat)?;
        (1..=seats.len())
            .map(|step| &seats[(start + step) % seats.len()])
            .find(|s| s.is_active())
            .map(|s| s.id)
    }

    proptest! {
        #[test]
        fn prop_cards_are_conserved_and_turns_skip_eliminated(
            seed in any::<u64>(),
            steps in prop::collection::vec((0usize..4, 0usize..3, any::<bool>(), 0u32..4), 1..80),
        ) {
            let mut session = started_with(config(4), seed);
            for (actual, fake, challenged, accuser) in steps {
                match session.phase().clone() {
                    GamePhase::AwaitingClaim(seat) => {
                        let current = session.seat(seat).unwrap();
                        prop_assert!(current.is_active() && current.connected);
                        let _ = session.submit_claim(seat, actual, actual + fake);
                    }
                    GamePhase::ChallengeWindow => {
                        let author = session.live_claim().unwrap().author;
                        let before = session.active_seat_ids().len();
                        let accuser = SeatId(accuser);
                        let valid_accuser = challenged
                            && accuser != author
                            && session.seat(accuser).is_some_and(|s| s.is_active());
                        let outcome = if challenged {
                            ChallengeOutcome::ChallengedBy(accuser)
                        } else {
                            ChallengeOutcome::NoChallenge
                        };
                        session.resolve_challenge(outcome);

                        let eliminated = before - session.active_seat_ids().len();
                        prop_assert_eq!(eliminated, if valid_accuser { 1 } else { 0 });
                        if let GamePhase::AwaitingClaim(next) = session.phase().clone() {
                            prop_assert_eq!(Some(next), next_active_after(&session, author));
                        }
                    }
                    _ => break,
                }
                prop_assert_eq!(session.accounted_cards(), 20);
            }
        }
    }
}
