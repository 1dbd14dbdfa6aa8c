//! In-memory model of the tableau, foundations and draw deck.
//!
//! Nothing here touches the screen. The model is not synchronised: a `Board` is
//! mutated by a single control thread between one perception pass and the next
//! actuation, and must not be shared for concurrent mutation.

use crate::error::PlayError;

use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const TOTAL_FOUNDATIONS: usize = 4;
pub const TOTAL_STACKS: usize = 7;
pub const FULL_DECK: usize = 24;
pub const MAX_RANK: u8 = 13;

const VALUES: [&str; MAX_RANK as usize] = [
    "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
];
const STACK_SIZE: usize = 19;

/// Absolute screen coordinates, used only to aim the pointer.
pub type Point = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Diamonds,
    Hearts,
    Spades,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; TOTAL_FOUNDATIONS] =
        [Suit::Diamonds, Suit::Hearts, Suit::Spades, Suit::Clubs];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn tint(self) -> Tint {
        match self {
            Suit::Diamonds | Suit::Hearts => Tint::Red,
            Suit::Spades | Suit::Clubs => Tint::Black,
        }
    }

    pub fn letter(self) -> char {
        ['D', 'H', 'S', 'C'][self.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tint {
    Red,
    Black,
}

/// Numeric rank, A=1 through K=13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rank(u8);

impl Rank {
    pub const ACE: Rank = Rank(1);
    pub const KING: Rank = Rank(MAX_RANK);

    pub fn new(value: u8) -> Option<Self> {
        (1..=MAX_RANK).contains(&value).then_some(Self(value))
    }

    /// Parses a displayed rank label from the alphabet `A, 2..10, J, Q, K`.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        VALUES
            .iter()
            .position(|v| v.eq_ignore_ascii_case(label))
            .map(|i| Self(i as u8 + 1))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        VALUES[self.0 as usize - 1]
    }
}

/// The identity of a physical card within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardId {
    pub rank: Rank,
    pub suit: Suit,
}

/// A face-up card as observed on screen.
///
/// `location` is actuation-target data. It never takes part in equality or
/// hashing, which only look at rank and suit.
#[derive(Debug, Clone, Copy)]
pub struct Card {
    id: CardId,
    pub location: Point,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit, location: Point) -> Self {
        Self {
            id: CardId { rank, suit },
            location,
        }
    }

    /// Builds a card from a classifier label, rejecting labels outside the alphabet.
    pub fn from_label(label: &str, suit: Suit, location: Point) -> Result<Self, PlayError> {
        let rank = Rank::parse(label)
            .ok_or_else(|| PlayError::Perception(format!("unrecognized rank label '{label}'")))?;
        Ok(Self::new(rank, suit, location))
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn rank(&self) -> Rank {
        self.id.rank
    }

    pub fn suit(&self) -> Suit {
        self.id.suit
    }

    pub fn tint(&self) -> Tint {
        self.id.suit.tint()
    }

    pub fn pretty_print(&self) -> String {
        format!("{}{}", self.rank().label(), self.suit().letter())
    }
}

impl PartialEq for Card {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Card {}

impl Hash for Card {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_print())
    }
}

/// One tableau column: face-down count plus visible cards, bottom to top.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    pub cards: SmallVec<[Card; STACK_SIZE]>,
    pub hidden: usize,
}

impl Stack {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn peek_top(&self) -> Option<&Card> {
        self.cards.last()
    }

    /// True when the next perception pass may turn over a face-down card here.
    pub fn can_reveal(&self) -> bool {
        self.cards.is_empty() && self.hidden > 0
    }
}

/// The draw pile as far as it has been observed.
///
/// `cards` holds the observed cards in draw order; cards not yet turned over are
/// only counted in `size`. `index` is the exposed card, `-1` when none is.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    index: isize,
    size: usize,
    draw_count: usize,
    full_size: usize,
}

impl Deck {
    pub fn new(full_size: usize) -> Self {
        Self {
            cards: Vec::with_capacity(full_size),
            index: -1,
            size: full_size,
            draw_count: 0,
            full_size,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Distinct cards observed so far, including those already played out.
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_fully_known(&self) -> bool {
        self.draw_count >= self.full_size
    }

    pub fn current(&self) -> Option<&Card> {
        usize::try_from(self.index)
            .ok()
            .and_then(|i| self.cards.get(i))
    }

    /// The last card is exposed, so the next draw turns the waste back over first.
    pub fn needs_restack(&self) -> bool {
        self.size > 0 && self.index == self.size as isize - 1
    }

    fn next_index(&self) -> isize {
        if self.needs_restack() {
            0
        } else {
            self.index + 1
        }
    }

    /// True when the next draw exposes a card that has never been observed.
    pub fn next_is_unseen(&self) -> bool {
        self.size > 0 && self.next_index() as usize >= self.cards.len()
    }

    /// Advances the cursor, wrapping to the first card after the last one.
    ///
    /// `observed` must carry the newly exposed card when [`Deck::next_is_unseen`]
    /// holds; otherwise it is only used to refresh the known card's location.
    pub fn draw(&mut self, observed: Option<Card>) -> Result<Card, PlayError> {
        if self.size == 0 {
            return Err(PlayError::DeckAnomaly("draw from an empty deck".into()));
        }
        let next = self.next_index();
        let slot = next as usize;
        if slot == self.cards.len() {
            let card = observed.ok_or_else(|| {
                PlayError::DeckAnomaly(format!("card at position {slot} drawn unobserved"))
            })?;
            if self.cards.contains(&card) {
                return Err(PlayError::DeckAnomaly(format!(
                    "{card} observed twice in the deck"
                )));
            }
            if self.is_fully_known() {
                return Err(PlayError::DeckAnomaly(format!(
                    "{card} observed after all {} deck cards were known",
                    self.full_size
                )));
            }
            self.cards.push(card);
            self.draw_count += 1;
        } else if slot > self.cards.len() || slot >= self.size {
            return Err(PlayError::DeckAnomaly(format!(
                "cursor {next} outside {} known of {}",
                self.cards.len(),
                self.size
            )));
        } else if let Some(card) = observed.filter(|card| *card == self.cards[slot]) {
            self.cards[slot].location = card.location;
        }
        self.index = next;
        Ok(self.cards[slot])
    }

    /// Detaches the exposed card and rewinds the cursor onto the previous one.
    pub fn remove_current(&mut self) -> Result<Card, PlayError> {
        let slot = usize::try_from(self.index)
            .ok()
            .filter(|&i| i < self.cards.len())
            .ok_or_else(|| {
                PlayError::DeckAnomaly(format!("no exposed card at cursor {}", self.index))
            })?;
        let card = self.cards.remove(slot);
        self.size -= 1;
        self.index -= 1;
        Ok(card)
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    pub stacks: [Stack; TOTAL_STACKS],
    pub foundations: [u8; TOTAL_FOUNDATIONS],
    pub deck: Deck,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(FULL_DECK)
    }
}

impl Board {
    /// A fresh deal: column `i` hides `i` cards, the deck holds `deck_size` unseen cards.
    pub fn new(deck_size: usize) -> Self {
        Self {
            stacks: std::array::from_fn(|i| Stack {
                cards: SmallVec::new(),
                hidden: i,
            }),
            foundations: [0; TOTAL_FOUNDATIONS],
            deck: Deck::new(deck_size),
        }
    }

    /// Whether a card with this identity already exists anywhere, foundations included.
    pub fn knows(&self, id: CardId) -> bool {
        self.foundations[id.suit.index()] >= id.rank.value()
            || self.deck.cards.iter().any(|c| c.id() == id)
            || self
                .stacks
                .iter()
                .any(|s| s.cards.iter().any(|c| c.id() == id))
    }

    /// Places a card sighted during the initial pass. Returns false for repeats.
    pub fn seed(&mut self, column: usize, card: Card) -> bool {
        if column >= TOTAL_STACKS || self.knows(card.id()) {
            return false;
        }
        self.stacks[column].cards.push(card);
        true
    }

    /// Updates the location of an already-known card. Returns false if unknown.
    pub fn refresh_location(&mut self, card: &Card) -> bool {
        let target = self
            .stacks
            .iter_mut()
            .flat_map(|s| s.cards.iter_mut())
            .chain(self.deck.cards.iter_mut())
            .find(|c| *c == card);
        match target {
            Some(known) => {
                known.location = card.location;
                true
            }
            None => false,
        }
    }

    /// Turns over the topmost face-down card of an otherwise empty column.
    pub fn reveal(&mut self, column: usize, card: Card) -> Result<(), PlayError> {
        let stack = self
            .stacks
            .get(column)
            .ok_or_else(|| PlayError::InvalidMove(format!("no stack {column}")))?;
        if !stack.can_reveal() {
            return Err(PlayError::InvalidMove(format!(
                "stack {column} has nothing to reveal ({} visible, {} hidden)",
                stack.len(),
                stack.hidden
            )));
        }
        if self.knows(card.id()) {
            return Err(PlayError::Perception(format!(
                "{card} revealed on stack {column} is already known"
            )));
        }
        let stack = &mut self.stacks[column];
        stack.cards.push(card);
        stack.hidden -= 1;
        Ok(())
    }

    pub fn can_found(&self, card: &Card) -> bool {
        card.rank().value() == self.foundations[card.suit().index()] + 1
    }

    /// Applies the strict-successor rule; the foundation only ever grows by one.
    pub fn foundation_accept(&mut self, card: &Card) -> bool {
        if !self.can_found(card) {
            return false;
        }
        self.foundations[card.suit().index()] += 1;
        true
    }

    /// Sends the top card of `stack` home if legal.
    pub fn found_stack(&mut self, stack: usize) -> bool {
        let Some(card) = self.stacks[stack].peek_top().copied() else {
            return false;
        };
        if !self.foundation_accept(&card) {
            return false;
        }
        self.stacks[stack].cards.pop();
        true
    }

    /// Sends the exposed deck card home if legal.
    pub fn found_deck(&mut self) -> Result<bool, PlayError> {
        let Some(card) = self.deck.current().copied() else {
            return Ok(false);
        };
        if !self.can_found(&card) {
            return Ok(false);
        }
        self.deck.remove_current()?;
        self.foundation_accept(&card);
        Ok(true)
    }

    /// Moves `stacks[source][index..]` onto `target`, preserving order.
    pub fn move_cards(
        &mut self,
        source: usize,
        index: usize,
        target: usize,
    ) -> Result<(), PlayError> {
        if source == target || source >= TOTAL_STACKS || target >= TOTAL_STACKS {
            return Err(PlayError::InvalidMove(format!(
                "cannot move from stack {source} to stack {target}"
            )));
        }
        if index >= self.stacks[source].len() {
            return Err(PlayError::InvalidMove(format!(
                "stack {source} has no card at {index}"
            )));
        }
        let moved: SmallVec<[Card; STACK_SIZE]> = self.stacks[source].cards.drain(index..).collect();
        self.stacks[target].cards.extend(moved);
        Ok(())
    }

    /// Moves the exposed deck card onto `target`.
    pub fn deck_to_stack(&mut self, target: usize) -> Result<Card, PlayError> {
        if target >= TOTAL_STACKS {
            return Err(PlayError::InvalidMove(format!("no stack {target}")));
        }
        let card = self.deck.remove_current()?;
        self.stacks[target].cards.push(card);
        Ok(card)
    }

    pub fn is_won(&self) -> bool {
        self.foundations.iter().all(|&f| f == MAX_RANK)
    }

    pub fn pretty_print(&self) -> String {
        let mut output = String::new();

        // Deck
        if self.deck.is_empty() {
            output.push_str("Empty deck\n");
        } else {
            let current = self
                .deck
                .current()
                .map(|c| c.pretty_print())
                .unwrap_or_else(|| "-".into());
            output.push_str(&format!(
                "Deck ({}, {} seen): {current}\n",
                self.deck.size(),
                self.deck.draw_count()
            ));
        }

        // Foundations
        for suit in Suit::ALL {
            output.push_str(&format!(
                "Foundation {}: {}\n",
                suit.letter(),
                self.foundations[suit.index()]
            ));
        }

        // Stacks
        for (i, stack) in self.stacks.iter().enumerate() {
            output.push_str(&format!("Stack {i} ({} hidden):", stack.hidden));
            for card in &stack.cards {
                output.push(' ');
                output.push_str(&card.pretty_print());
            }
            output.push('\n');
        }

        output
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_print())
    }
}
