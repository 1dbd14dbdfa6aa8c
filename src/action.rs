use crate::board::{Board, Card};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Move {
    StackToFoundation(usize),
    DeckToFoundation,
    DeckToStack(usize),
    StackToStack(usize, usize, usize), // (source, index, target)
    Draw,
    Reveal(usize),
}

impl Move {
    /// Moves that count as tableau progress when deciding whether a pass stalled.
    pub fn is_tableau_move(&self) -> bool {
        matches!(self, Move::DeckToStack(_) | Move::StackToStack(..))
    }

    pub fn is_foundation_move(&self) -> bool {
        matches!(self, Move::StackToFoundation(_) | Move::DeckToFoundation)
    }
}

pub fn format_moves(moves: &[Move]) -> String {
    let mut list = vec![];
    let mut i = 0;
    while i < moves.len() {
        match moves[i] {
            Move::Draw => {
                let mut count = 1;
                while i + count < moves.len() && matches!(moves[i + count], Move::Draw) {
                    count += 1;
                }
                let str = if count == 1 {
                    "D".into()
                } else {
                    format!("{count}D")
                };
                list.push(str);
                i += count;
                continue;
            }
            Move::StackToFoundation(stack) => list.push(format!("T{}:F", stack + 1)),
            Move::DeckToFoundation => list.push("W:F".into()),
            Move::DeckToStack(target) => list.push(format!("W:T{}", target + 1)),
            Move::StackToStack(source, index, target) => {
                list.push(format!("T{}@{}:T{}", source + 1, index, target + 1));
            }
            Move::Reveal(stack) => list.push(format!("R{}", stack + 1)),
        }
        i += 1;
    }

    let mut output = String::new();
    let max_width = list.iter().map(|s| s.len()).max().unwrap_or_default() + 1;
    for chunk in list.chunks(10) {
        for cmd in chunk {
            output.push_str(&format!("{cmd:<width$}", width = max_width));
        }
        output.push('\n');
    }

    output
}

/// Describes a move against the board it is about to be applied to.
pub fn describe_move(board: &Board, mov: &Move) -> String {
    let format_card =
        |card: Option<&Card>| -> String { card.map(|c| c.pretty_print()).unwrap_or_default() };

    match mov {
        Move::StackToFoundation(stack) => {
            let card = format_card(board.stacks[*stack].peek_top());
            format!("(Stack{stack}) {card} -> (Foundation)")
        }
        Move::DeckToFoundation => {
            format!("(Deck) {} -> (Foundation)", format_card(board.deck.current()))
        }
        Move::DeckToStack(target) => {
            let from_card = format_card(board.deck.current());
            let to_card = format_card(board.stacks[*target].peek_top());
            format!("(Deck) {from_card} -> (Stack{target}) {to_card}")
        }
        Move::StackToStack(source, index, target) => {
            let from_cards = board.stacks[*source]
                .cards
                .iter()
                .skip(*index)
                .map(|c| c.pretty_print())
                .collect::<Vec<_>>()
                .join(" ");
            let to_card = format_card(board.stacks[*target].peek_top());
            format!("(Stack{source}) {from_cards} -> (Stack{target}) {to_card}")
        }
        Move::Draw => {
            if board.deck.needs_restack() {
                "Restack and draw".to_string()
            } else {
                "Draw".to_string()
            }
        }
        Move::Reveal(stack) => format!(
            "Reveal stack{stack} ({} hidden)",
            board.stacks[*stack].hidden
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{FULL_DECK, Rank, Suit};

    #[test]
    fn test_format_moves_groups_draws() {
        let moves = [
            Move::Draw,
            Move::Draw,
            Move::Draw,
            Move::DeckToFoundation,
            Move::StackToStack(0, 2, 5),
            Move::Draw,
        ];
        let text = format_moves(&moves);
        let cmds: Vec<_> = text.split_whitespace().collect();
        assert_eq!(cmds, ["3D", "W:F", "T1@2:T6", "D"]);
    }

    #[test]
    fn test_describe_move() {
        let mut board = Board::new(FULL_DECK);
        board.seed(0, Card::new(Rank::new(6).unwrap(), Suit::Hearts, (0, 0)));
        board.seed(3, Card::new(Rank::new(7).unwrap(), Suit::Spades, (0, 0)));
        assert_eq!(
            describe_move(&board, &Move::StackToStack(0, 0, 3)),
            "(Stack0) 6H -> (Stack3) 7S"
        );
        assert_eq!(
            describe_move(&board, &Move::Reveal(5)),
            "Reveal stack5 (5 hidden)"
        );
        assert!(Move::DeckToStack(1).is_tableau_move());
        assert!(!Move::Draw.is_tableau_move());
        assert!(Move::DeckToFoundation.is_foundation_move());
    }
}
