//! Greedy move selection.
//!
//! Each outer pass runs four phases in strict priority order: foundation sweep,
//! deck-to-foundation sweep, one deck-to-tableau placement, then tableau-to-tableau
//! placements. The queries below only read the [`Board`]; executing the chosen
//! move is left to the caller. The heuristic is not complete and can stall on
//! positions that need a detour.

use crate::action::Move;
use crate::board::{Board, Card, CardId, TOTAL_STACKS};

use rustc_hash::FxHashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FoundationSweep,
    DeckSweep,
    DeckPlacement,
    TableauPlacement,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [
        Phase::FoundationSweep,
        Phase::DeckSweep,
        Phase::DeckPlacement,
        Phase::TableauPlacement,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::FoundationSweep => "foundation-sweep",
            Phase::DeckSweep => "deck-sweep",
            Phase::DeckPlacement => "deck-placement",
            Phase::TableauPlacement => "tableau-placement",
        };
        f.write_str(name)
    }
}

/// What one outer pass achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub foundations: usize,
    pub reveals: usize,
    pub tableau_moves: usize,
    pub draws: usize,
}

impl PassReport {
    /// Draws alone are not progress.
    pub fn is_idle(&self) -> bool {
        self.foundations == 0 && self.reveals == 0 && self.tableau_moves == 0
    }

    pub fn record(&mut self, mov: &Move) {
        if mov.is_foundation_move() {
            self.foundations += 1;
        } else if mov.is_tableau_move() {
            self.tableau_moves += 1;
        } else if let Move::Reveal(_) = mov {
            self.reveals += 1;
        } else {
            self.draws += 1;
        }
    }

    pub fn merge(&mut self, other: &PassReport) {
        self.foundations += other.foundations;
        self.reveals += other.reveals;
        self.tableau_moves += other.tableau_moves;
        self.draws += other.draws;
    }
}

/// True iff `source` is exactly one rank below `target` and of the other tint.
pub fn can_stack_on(source: &Card, target: &Card) -> bool {
    source.rank().value() + 1 == target.rank().value() && source.tint() != target.tint()
}

/// Holds the cards already shuffled between stacks during the current pass.
#[derive(Debug, Default)]
pub struct Planner {
    moved: FxHashSet<CardId>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the previous pass's tableau moves.
    pub fn begin_pass(&mut self) {
        self.moved.clear();
    }

    pub fn record_moved(&mut self, card: &Card) {
        self.moved.insert(card.id());
    }

    pub fn was_moved(&self, card: &Card) -> bool {
        self.moved.contains(&card.id())
    }

    pub fn foundation_move(&self, board: &Board, stack: usize) -> Option<Move> {
        let card = board.stacks[stack].peek_top()?;
        board
            .can_found(card)
            .then_some(Move::StackToFoundation(stack))
    }

    pub fn reveal_move(&self, board: &Board, stack: usize) -> Option<Move> {
        board.stacks[stack]
            .can_reveal()
            .then_some(Move::Reveal(stack))
    }

    pub fn deck_foundation_move(&self, board: &Board) -> Option<Move> {
        let card = board.deck.current()?;
        board.can_found(card).then_some(Move::DeckToFoundation)
    }

    /// First stack, left to right, whose top card takes the exposed deck card.
    pub fn deck_move(&self, board: &Board) -> Option<Move> {
        let card = board.deck.current()?;
        board
            .stacks
            .iter()
            .position(|stack| stack.peek_top().is_some_and(|top| can_stack_on(card, top)))
            .map(Move::DeckToStack)
    }

    /// Deepest visible card of `source` that fits on another stack's top card.
    /// `None` if that card was already moved this pass.
    pub fn stack_move(&self, board: &Board, source: usize) -> Option<Move> {
        for (index, card) in board.stacks[source].cards.iter().enumerate() {
            let target = (0..TOTAL_STACKS).find(|&target| {
                target != source
                    && board.stacks[target]
                        .peek_top()
                        .is_some_and(|top| can_stack_on(card, top))
            });
            if let Some(target) = target {
                if self.was_moved(card) {
                    return None;
                }
                return Some(Move::StackToStack(source, index, target));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{FULL_DECK, Rank, Suit};

    fn card(value: u8, suit: Suit) -> Card {
        Card::new(Rank::new(value).unwrap(), suit, (0, 0))
    }

    #[test]
    fn test_can_stack_on() {
        assert!(can_stack_on(&card(6, Suit::Hearts), &card(7, Suit::Spades)));
        assert!(can_stack_on(&card(12, Suit::Clubs), &card(13, Suit::Diamonds)));
        assert!(!can_stack_on(&card(6, Suit::Clubs), &card(7, Suit::Spades)));
        assert!(!can_stack_on(&card(6, Suit::Hearts), &card(7, Suit::Diamonds)));
        assert!(!can_stack_on(&card(5, Suit::Hearts), &card(7, Suit::Spades)));
        assert!(!can_stack_on(&card(7, Suit::Spades), &card(6, Suit::Hearts)));
        assert!(!can_stack_on(&card(7, Suit::Hearts), &card(7, Suit::Spades)));
    }

    #[test]
    fn test_foundation_and_reveal_moves() {
        let planner = Planner::new();
        let mut board = Board::new(FULL_DECK);
        board.seed(0, card(1, Suit::Diamonds));
        board.seed(1, card(2, Suit::Diamonds));
        assert_eq!(
            planner.foundation_move(&board, 0),
            Some(Move::StackToFoundation(0))
        );
        assert_eq!(planner.foundation_move(&board, 1), None);
        assert_eq!(planner.foundation_move(&board, 2), None);
        assert_eq!(planner.reveal_move(&board, 2), Some(Move::Reveal(2)));
        assert_eq!(planner.reveal_move(&board, 1), None);

        board.found_stack(0);
        assert_eq!(planner.reveal_move(&board, 0), None);
        assert_eq!(
            planner.foundation_move(&board, 1),
            Some(Move::StackToFoundation(1))
        );
    }

    #[test]
    fn test_deck_moves() {
        let planner = Planner::new();
        let mut board = Board::new(FULL_DECK);
        assert_eq!(planner.deck_move(&board), None);
        board.seed(2, card(9, Suit::Clubs));
        board.seed(4, card(9, Suit::Spades));
        board.deck.draw(Some(card(8, Suit::Hearts))).unwrap();
        assert_eq!(planner.deck_move(&board), Some(Move::DeckToStack(2)));
        assert_eq!(planner.deck_foundation_move(&board), None);

        board.deck.draw(Some(card(1, Suit::Clubs))).unwrap();
        assert_eq!(planner.deck_move(&board), None);
        assert_eq!(
            planner.deck_foundation_move(&board),
            Some(Move::DeckToFoundation)
        );
    }

    #[test]
    fn test_stack_move_prefers_deepest_card() {
        let mut planner = Planner::new();
        let mut board = Board::new(FULL_DECK);
        board.seed(0, card(8, Suit::Spades));
        board.seed(0, card(7, Suit::Diamonds));
        board.seed(0, card(6, Suit::Clubs));
        board.seed(3, card(9, Suit::Hearts));
        board.seed(5, card(8, Suit::Clubs));

        assert_eq!(planner.stack_move(&board, 0), Some(Move::StackToStack(0, 0, 3)));
        assert_eq!(planner.stack_move(&board, 3), None);

        // 7D could go onto 8C, but the run under a moved card stays together
        planner.record_moved(&card(8, Suit::Spades));
        assert_eq!(planner.stack_move(&board, 0), None);

        planner.begin_pass();
        assert!(!planner.was_moved(&card(8, Suit::Spades)));
        assert_eq!(planner.stack_move(&board, 0), Some(Move::StackToStack(0, 0, 3)));
    }

    #[test]
    fn test_stack_move_skips_cards_without_target() {
        let mut planner = Planner::new();
        let mut board = Board::new(FULL_DECK);
        board.seed(0, card(8, Suit::Spades));
        board.seed(0, card(7, Suit::Hearts));
        board.seed(2, card(8, Suit::Clubs));

        // 8S has nowhere to go, so 7H is the first legal card
        assert_eq!(planner.stack_move(&board, 0), Some(Move::StackToStack(0, 1, 2)));
        planner.record_moved(&card(7, Suit::Hearts));
        assert_eq!(planner.stack_move(&board, 0), None);
    }

    #[test]
    fn test_pass_report() {
        let mut report = PassReport::default();
        report.record(&Move::Draw);
        report.record(&Move::Draw);
        assert!(report.is_idle());
        report.record(&Move::Reveal(3));
        assert!(!report.is_idle());
        report.record(&Move::DeckToFoundation);
        report.record(&Move::StackToStack(0, 1, 2));
        assert_eq!((report.foundations, report.tableau_moves), (1, 1));
        let mut total = PassReport::default();
        total.merge(&report);
        assert_eq!((total.draws, total.reveals), (2, 1));
    }
}
