use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::PlayerSeat;

// --- 核心数据结构定义 ---

/// 轮次点数 (Rank)
/// 每一轮只有一个"当前点数"，按 Ace -> King -> Queen -> Ace 循环。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    King,
    Queen,
}

impl Rank {
    /// 下一轮的点数
    pub fn next(self) -> Rank {
        match self {
            Rank::Ace => Rank::King,
            Rank::King => Rank::Queen,
            Rank::Queen => Rank::Ace,
        }
    }
}

/// 单张牌 (Card)
/// Joker 是万能牌，任何一轮都算作匹配。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Card {
    Ace,
    King,
    Queen,
    Joker,
}

impl Card {
    /// 牌面点数，Joker 没有固定点数
    pub fn rank(self) -> Option<Rank> {
        match self {
            Card::Ace => Some(Rank::Ace),
            Card::King => Some(Rank::King),
            Card::Queen => Some(Rank::Queen),
            Card::Joker => None,
        }
    }

    pub fn is_wild(self) -> bool {
        self == Card::Joker
    }

    /// 这张牌能否算作本轮点数
    pub fn matches(self, rank: Rank) -> bool {
        self.is_wild() || self.rank() == Some(rank)
    }
}

impl From<Rank> for Card {
    fn from(rank: Rank) -> Self {
        match rank {
            Rank::Ace => Card::Ace,
            Rank::King => Card::King,
            Rank::Queen => Card::Queen,
        }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Ace => "A",
            Rank::King => "K",
            Rank::Queen => "Q",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.rank() {
            Some(rank) => write!(f, "{}", rank),
            None => write!(f, "Joker"),
        }
    }
}

// --- 牌组 ---

/// 牌组构成，默认 6 A + 6 K + 6 Q + 2 Joker = 20 张
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckComposition {
    pub aces: usize,
    pub kings: usize,
    pub queens: usize,
    pub jokers: usize,
}

impl Default for DeckComposition {
    fn default() -> Self {
        DeckComposition { aces: 6, kings: 6, queens: 6, jokers: 2 }
    }
}

impl DeckComposition {
    pub fn total(&self) -> usize {
        self.aces + self.kings + self.queens + self.jokers
    }
}

/// 一副有序的牌。每轮开始时重新构建并洗牌，牌只会流向玩家手中，不会凭空消失。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// 按构成创建一副未洗的牌
    pub fn new(composition: DeckComposition) -> Deck {
        let mut cards = Vec::with_capacity(composition.total());
        cards.extend(std::iter::repeat_n(Card::Ace, composition.aces));
        cards.extend(std::iter::repeat_n(Card::King, composition.kings));
        cards.extend(std::iter::repeat_n(Card::Queen, composition.queens));
        cards.extend(std::iter::repeat_n(Card::Joker, composition.jokers));
        Deck { cards }
    }

    /// 创建并均匀随机洗牌
    pub fn shuffled<R: Rng + ?Sized>(composition: DeckComposition, rng: &mut R) -> Deck {
        let mut deck = Deck::new(composition);
        deck.shuffle(rng);
        deck
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// 轮流发牌：第 i 张牌发给第 i % n 个未淘汰的座位。
    /// 余下的牌自然落在顺序靠前的座位上。发牌前清空这些座位的手牌。
    pub fn deal(self, seats: &mut [PlayerSeat]) {
        let mut active: Vec<&mut PlayerSeat> = seats.iter_mut().filter(|s| s.is_active()).collect();
        if active.is_empty() {
            return;
        }
        for seat in active.iter_mut() {
            seat.hand.clear();
        }
        let n = active.len();
        for (i, card) in self.cards.into_iter().enumerate() {
            active[i % n].hand.push(card);
        }
    }
}

// --- 单元测试 ---
