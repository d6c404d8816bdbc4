use crate::card::{Card, Rank};
use crate::config::SessionConfig;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type SessionId = Uuid;

/// 座位ID，按加入顺序分配，整局不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(pub u32);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个玩家的座位状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub id: SeatId,
    pub hand: Vec<Card>,
    /// 被淘汰后不再轮到出牌、不再发牌、不能质疑，但ID保留用于广播
    pub eliminated: bool,
    /// 网络连接是否还在 (连接本身由外部桥接层持有)
    pub connected: bool,
    /// 本次质疑窗口内是否喊过"BLUFF"，窗口结束时清除
    pub challenge_requested: bool,
}

impl PlayerSeat {
    pub fn new(id: SeatId) -> Self {
        PlayerSeat {
            id,
            hand: Vec::new(),
            eliminated: false,
            connected: true,
            challenge_requested: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    /// 手中能算作 `rank` 的牌数 (含 Joker)
    pub fn matching_count(&self, rank: Rank) -> usize {
        self.hand.iter().filter(|c| c.matches(rank)).count()
    }

    /// 手中不匹配、只能拿来充数的牌数
    pub fn disguisable_count(&self, rank: Rank) -> usize {
        self.hand.len() - self.matching_count(rank)
    }

    /// 从手牌中取出 `actual` 张匹配牌和 `fake` 张充数牌。
    /// 匹配牌优先用真点数，不够再用 Joker。调用方需先校验数量。
    pub(crate) fn take_cards(&mut self, rank: Rank, actual: usize, fake: usize) -> Vec<Card> {
        let mut taken = Vec::with_capacity(actual + fake);
        let exact = Card::from(rank);
        for wanted in [exact, Card::Joker] {
            while taken.len() < actual {
                match self.hand.iter().position(|&c| c == wanted) {
                    Some(pos) => taken.push(self.hand.remove(pos)),
                    None => break,
                }
            }
        }
        for _ in 0..fake {
            if let Some(pos) = self.hand.iter().position(|c| !c.matches(rank)) {
                taken.push(self.hand.remove(pos));
            }
        }
        taken
    }
}

/// 一次出牌声明。出牌时牌就已经离开手牌，放在这里等待质疑结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub author: SeatId,
    pub rank: Rank,
    /// 真正匹配本轮点数的张数
    pub actual_count: usize,
    /// 对外宣称的张数 = actual_count + 充数张数
    pub claimed_count: usize,
    pub cards: Vec<Card>,
}

impl Claim {
    pub fn fake_count(&self) -> usize {
        self.claimed_count - self.actual_count
    }

    /// 声明与实际不符即为说谎，与本轮点数无关
    pub fn is_truthful(&self) -> bool {
        self.actual_count == self.claimed_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    WaitingForPlayers,
    RoundStart,
    AwaitingClaim(SeatId),
    ChallengeWindow,
    GameOver { winner: Option<SeatId> },
}

/// 淘汰原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationReason {
    /// 出牌者说谎被抓
    CaughtBluffing,
    /// 质疑者冤枉了诚实的出牌者
    FalseAccusation,
    /// 断线
    Disconnected,
}

impl fmt::Display for EliminationReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            EliminationReason::CaughtBluffing => "caught bluffing",
            EliminationReason::FalseAccusation => "false accusation",
            EliminationReason::Disconnected => "disconnected",
        })
    }
}

/// 整个对局的权威状态。只能由协调者通过 logic.rs 中的操作修改。
#[derive(Debug)]
pub struct GameSession {
    pub(crate) id: SessionId,
    pub(crate) config: SessionConfig,
    // 顺序即出牌顺序，开局后固定；淘汰的座位被跳过而不是移除
    pub(crate) seats: Vec<PlayerSeat>,
    pub(crate) next_seat_id: u32,
    pub(crate) round_rank: Option<Rank>,
    pub(crate) turn_cursor: usize,
    // 每次 TurnStarted 自增，协调者用它判断回合是否换人
    pub(crate) turn_serial: u64,
    // 本轮已行动过的座位，索引对应 seats
    pub(crate) acted: Vec<bool>,
    pub(crate) live_claim: Option<Claim>,
    // 无人质疑或已结算的牌，下轮开始时回收重洗
    pub(crate) discard: Vec<Card>,
    pub(crate) phase: GamePhase,
    pub(crate) rng: StdRng,
}

/// 发给某个客户端的净化后状态快照：只包含该玩家自己的手牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub phase: GamePhase,
    pub round_rank: Option<Rank>,
    pub seats: Vec<SeatSummary>,
    pub live_claim: Option<ClaimSummary>,
    pub your_seat: Option<SeatId>,
    pub your_hand: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSummary {
    pub id: SeatId,
    pub hand_size: usize,
    pub eliminated: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub author: SeatId,
    pub claimed_count: usize,
}

impl GameSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> &GamePhase {
        &self.phase
    }

    pub fn round_rank(&self) -> Option<Rank> {
        self.round_rank
    }

    pub fn seats(&self) -> &[PlayerSeat] {
        &self.seats
    }

    pub fn seat(&self, id: SeatId) -> Option<&PlayerSeat> {
        self.seats.iter().find(|s| s.id == id)
    }

    pub fn live_claim(&self) -> Option<&Claim> {
        self.live_claim.as_ref()
    }

    pub fn turn_serial(&self) -> u64 {
        self.turn_serial
    }

    /// 当前应出牌的座位
    pub fn current_seat(&self) -> Option<SeatId> {
        match self.phase {
            GamePhase::AwaitingClaim(id) => Some(id),
            _ => None,
        }
    }

    /// 对局是否进行中
    pub fn is_running(&self) -> bool {
        !matches!(self.phase, GamePhase::WaitingForPlayers | GamePhase::GameOver { .. })
    }

    pub fn active_seat_ids(&self) -> Vec<SeatId> {
        self.seats.iter().filter(|s| s.is_active()).map(|s| s.id).collect()
    }

    /// 手牌 + 待结算声明 + 弃牌堆 的总张数，对局中恒等于牌组大小
    pub fn accounted_cards(&self) -> usize {
        let in_hands: usize = self.seats.iter().map(|s| s.hand.len()).sum();
        let live = self.live_claim.as_ref().map_or(0, |c| c.cards.len());
        in_hands + live + self.discard.len()
    }

    pub(crate) fn index_of(&self, id: SeatId) -> Option<usize> {
        self.seats.iter().position(|s| s.id == id)
    }

    pub fn for_client(&self, viewer: Option<SeatId>) -> SessionView {
        SessionView {
            session_id: self.id,
            phase: self.phase.clone(),
            round_rank: self.round_rank,
            seats: self
                .seats
                .iter()
                .map(|s| SeatSummary {
                    id: s.id,
                    hand_size: s.hand.len(),
                    eliminated: s.eliminated,
                    connected: s.connected,
                })
                .collect(),
            live_claim: self.live_claim.as_ref().map(|c| ClaimSummary {
                author: c.author,
                claimed_count: c.claimed_count,
            }),
            your_seat: viewer,
            your_hand: viewer
                .and_then(|id| self.seat(id))
                .map(|s| s.hand.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat_with(cards: &[Card]) -> PlayerSeat {
        let mut seat = PlayerSeat::new(SeatId(0));
        seat.hand = cards.to_vec();
        seat
    }

    #[test]
    fn test_counts_include_jokers() {
        let seat = seat_with(&[Card::Ace, Card::Joker, Card::King, Card::Queen]);
        assert_eq!(seat.matching_count(Rank::Ace), 2);
        assert_eq!(seat.disguisable_count(Rank::Ace), 2);
    }

    #[test]
    fn test_take_cards_prefers_exact_rank_over_joker() {
        let mut seat = seat_with(&[Card::Joker, Card::King, Card::Ace, Card::Queen]);
        let taken = seat.take_cards(Rank::Ace, 1, 1);
        assert_eq!(taken, vec![Card::Ace, Card::King]);
        assert_eq!(seat.hand, vec![Card::Joker, Card::Queen]);
    }

    #[test]
    fn test_take_cards_falls_back_to_joker() {
        let mut seat = seat_with(&[Card::Joker, Card::Ace, Card::King]);
        let taken = seat.take_cards(Rank::Ace, 2, 0);
        assert_eq!(taken, vec![Card::Ace, Card::Joker]);
        assert_eq!(seat.hand, vec![Card::King]);
    }

    #[test]
    fn test_claim_truthfulness() {
        let claim = Claim {
            author: SeatId(0),
            rank: Rank::Ace,
            actual_count: 2,
            claimed_count: 3,
            cards: vec![Card::Ace, Card::Ace, Card::King],
        };
        assert_eq!(claim.fake_count(), 1);
        assert!(!claim.is_truthful());
    }
}
