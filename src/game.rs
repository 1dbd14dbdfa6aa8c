//! Drives perception, planning and actuation until play stalls.
//!
//! The loop is single-threaded and blocking. Every actuation sleeps for the
//! configured delay, and a capture or input call that hangs stalls the whole run.

use crate::action::{Move, describe_move};
use crate::autoplay::{Actuator, ClickMode};
use crate::board::{Board, Card, Point, TOTAL_STACKS};
use crate::config::Config;
use crate::error::PlayError;
use crate::planner::{PassReport, Phase, Planner};
use crate::vision::{Detection, Perception};

use anyhow::{Context, Result};
use std::thread::sleep;
use tracing::{debug, error, info, info_span, warn};

/// Outcome of [`Game::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: usize,
    pub total: PassReport,
    pub won: bool,
}

pub struct Game<P, A> {
    board: Board,
    perception: P,
    actuator: A,
    planner: Planner,
    config: Config,
    history: Vec<Move>,
}

/// Seeds a fresh board from one full perception pass.
pub fn perceive_board(perception: &mut impl Perception, config: &Config) -> Result<Board> {
    let mut board = Board::new(config.full_deck);
    let detections = perception
        .detect_cards()
        .context("Failed the initial perception pass")?;
    if detections.is_empty() {
        warn!("No face-up card found on the board");
    }
    for Detection { column, card } in detections {
        if !board.seed(column, card) {
            warn!("Ignoring repeated sighting of {card} on stack {column}");
        }
    }
    Ok(board)
}

impl<P: Perception, A: Actuator> Game<P, A> {
    /// Reads the tableau from the screen and starts tracking it.
    pub fn new(mut perception: P, actuator: A, config: Config) -> Result<Self> {
        let board = perceive_board(&mut perception, &config)?;
        info!("Initial state\n{board}");
        Ok(Self::with_board(perception, actuator, config, board))
    }

    /// Resumes from a known board without a perception pass.
    pub fn with_board(perception: P, actuator: A, config: Config, board: Board) -> Self {
        Self {
            board,
            perception,
            actuator,
            planner: Planner::new(),
            config,
            history: vec![],
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Every move applied so far, in order.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn into_parts(self) -> (P, A) {
        (self.perception, self.actuator)
    }

    /// Plays up to `iterations` outer passes, stopping early once a pass makes
    /// no progress. A fatal error stops the run after dumping the board.
    pub fn run(&mut self, iterations: usize) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for pass in 1..=iterations {
            let _span = info_span!("pass", pass).entered();
            let report = match self.step() {
                Ok(report) => report,
                Err(err) => {
                    error!("Run stopped: {err:#}\n{}", self.board);
                    return Err(err);
                }
            };
            debug!(?report, "Pass finished");
            summary.passes = pass;
            summary.total.merge(&report);
            if self.board.is_won() {
                info!("All foundations are complete");
                break;
            }
            if report.is_idle() {
                info!("No further progress possible");
                break;
            }
        }
        summary.won = self.board.is_won();
        info!("Final state\n{}", self.board);
        Ok(summary)
    }

    /// Runs one outer pass through the four planner phases.
    pub fn step(&mut self) -> Result<PassReport> {
        self.planner.begin_pass();
        let mut report = PassReport::default();
        for phase in Phase::ORDER {
            let _span = info_span!("phase", %phase).entered();
            match phase {
                Phase::FoundationSweep => self.foundation_sweep(&mut report)?,
                Phase::DeckSweep => self.deck_sweep(&mut report)?,
                Phase::DeckPlacement => self.deck_placement(&mut report)?,
                Phase::TableauPlacement => self.tableau_placement(&mut report)?,
            }
        }
        Ok(report)
    }

    fn foundation_sweep(&mut self, report: &mut PassReport) -> Result<()> {
        for stack in 0..TOTAL_STACKS {
            loop {
                while let Some(mov) = self.planner.foundation_move(&self.board, stack) {
                    self.execute(mov, report)?;
                }
                let Some(mov) = self.planner.reveal_move(&self.board, stack) else {
                    break;
                };
                if !self.execute(mov, report)? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Draws until a whole deck's worth of draws sends nothing home.
    fn deck_sweep(&mut self, report: &mut PassReport) -> Result<()> {
        let mut misses = 0;
        loop {
            while let Some(mov) = self.planner.deck_foundation_move(&self.board) {
                self.execute(mov, report)?;
                misses = 0;
            }
            if self.board.deck.is_empty() || misses >= self.board.deck.size() {
                break;
            }
            self.execute(Move::Draw, report)?;
            misses += 1;
        }
        Ok(())
    }

    fn deck_placement(&mut self, report: &mut PassReport) -> Result<()> {
        if let Some(mov) = self.planner.deck_move(&self.board) {
            self.execute(mov, report)?;
            self.reveal_pending(report)?;
        }
        Ok(())
    }

    fn tableau_placement(&mut self, report: &mut PassReport) -> Result<()> {
        loop {
            let mut moved = false;
            for source in 0..TOTAL_STACKS {
                let Some(mov) = self.planner.stack_move(&self.board, source) else {
                    continue;
                };
                if let Move::StackToStack(_, index, _) = mov {
                    let card = self.board.stacks[source].cards[index];
                    self.planner.record_moved(&card);
                }
                self.execute(mov, report)?;
                moved = true;
            }
            if !moved {
                break;
            }
        }
        self.reveal_pending(report)
    }

    /// Actuates and applies one move. Returns false if it turned out to be a no-op.
    fn execute(&mut self, mov: Move, report: &mut PassReport) -> Result<bool> {
        info!("{}", describe_move(&self.board, &mov));
        let applied = match mov {
            Move::StackToFoundation(stack) => self.found_stack(stack)?,
            Move::DeckToFoundation => self.found_deck()?,
            Move::DeckToStack(target) => {
                self.move_deck(target)?;
                true
            }
            Move::StackToStack(source, index, target) => {
                self.move_stack(source, index, target)?;
                true
            }
            Move::Draw => self.draw()?,
            Move::Reveal(stack) => {
                let revealed = self.observe()?;
                for &column in &revealed {
                    report.record(&Move::Reveal(column));
                    self.history.push(Move::Reveal(column));
                }
                if !revealed.contains(&stack) {
                    warn!("Nothing revealed on stack {stack}");
                }
                return Ok(revealed.contains(&stack));
            }
        };
        if applied {
            report.record(&mov);
            self.history.push(mov);
        }
        Ok(applied)
    }

    fn found_stack(&mut self, stack: usize) -> Result<bool> {
        let Some(card) = self.board.stacks[stack].peek_top().copied() else {
            return Ok(false);
        };
        if !self.board.can_found(&card) {
            return Ok(false);
        }
        info!("Sending {card} to foundations");
        self.actuator
            .click(card.location, ClickMode::Right, self.config.timing.click_hold())?;
        sleep(self.config.timing.foundation());
        Ok(self.board.found_stack(stack))
    }

    fn found_deck(&mut self) -> Result<bool> {
        let Some(card) = self.board.deck.current().copied() else {
            return Ok(false);
        };
        if !self.board.can_found(&card) {
            return Ok(false);
        }
        info!("Sending {card} to foundations");
        self.actuator
            .click(card.location, ClickMode::Right, self.config.timing.click_hold())?;
        sleep(self.config.timing.foundation());
        Ok(self.board.found_deck()?)
    }

    /// Clicks the draw pile, restacking first when the last card is exposed.
    fn draw(&mut self) -> Result<bool> {
        if self.board.deck.is_empty() {
            return Ok(false);
        }
        let stock = self.config.stock;
        let delay = self.config.timing.draw();
        let hold = self.config.timing.click_hold();
        if self.board.deck.needs_restack() {
            info!("Deck is empty, clicking to re-stack cards");
            self.actuator.click(stock, ClickMode::Left, hold)?;
            sleep(delay);
        }
        self.actuator.click(stock, ClickMode::Left, hold)?;
        sleep(delay);

        let observed = if self.board.deck.next_is_unseen() {
            Some(self.observe_deck()?)
        } else {
            self.perception.detect_deck()?
        };
        let was_known = self.board.deck.is_fully_known();
        let card = self.board.deck.draw(observed)?;
        info!("Drew a card: {card}");
        if !was_known && self.board.deck.is_fully_known() {
            info!("All cards in deck are known");
        }
        Ok(true)
    }

    /// Reads a never-seen deck card, retrying while the read fails or repeats a
    /// known card.
    fn observe_deck(&mut self) -> Result<Card> {
        let timing = self.config.timing;
        for attempt in 0..=timing.observe_retries {
            if attempt > 0 {
                sleep(timing.observe_delay());
            }
            match self.perception.detect_deck()? {
                Some(card) if !self.board.knows(card.id()) => return Ok(card),
                Some(card) => warn!("Deck shows {card}, which is already known"),
                None => warn!("No card could be read from the deck"),
            }
        }
        Err(PlayError::DeckAnomaly(format!(
            "no new card read after {} attempts",
            timing.observe_retries + 1
        ))
        .into())
    }

    /// Drags `stacks[source][index..]` onto `target`.
    fn move_stack(&mut self, source: usize, index: usize, target: usize) -> Result<()> {
        let card = *self.board.stacks[source]
            .cards
            .get(index)
            .ok_or_else(|| PlayError::InvalidMove(format!("stack {source} has no card {index}")))?;
        let drop_point = self.drop_point(target)?;
        info!("Moving {card} from {source} to {target}");
        self.actuator.drag(card.location, drop_point)?;

        let start = self.board.stacks[target].len();
        self.board.move_cards(source, index, target)?;
        self.shift_moved(target, start, card.location);
        Ok(())
    }

    /// Drags the exposed deck card onto `target`.
    fn move_deck(&mut self, target: usize) -> Result<()> {
        let card = *self
            .board
            .deck
            .current()
            .ok_or_else(|| PlayError::DeckAnomaly("no exposed deck card to move".into()))?;
        let drop_point = self.drop_point(target)?;
        info!("Moving deck card to {target}");
        self.actuator.drag(card.location, drop_point)?;

        let start = self.board.stacks[target].len();
        self.board.deck_to_stack(target)?;
        self.shift_moved(target, start, card.location);
        Ok(())
    }

    fn drop_point(&self, target: usize) -> Result<Point, PlayError> {
        let top = self.board.stacks[target]
            .peek_top()
            .ok_or_else(|| PlayError::InvalidMove(format!("stack {target} has no top card")))?;
        Ok((self.config.drop_x[target], top.location.1))
    }

    /// Moves the locations of `stacks[target][start..]` so the first of them sits
    /// one fan step below the card it landed on.
    fn shift_moved(&mut self, target: usize, start: usize, origin: Point) {
        let cards = &mut self.board.stacks[target].cards;
        let Some(below) = start.checked_sub(1).map(|i| cards[i].location) else {
            return;
        };
        let dx = below.0 - origin.0;
        let dy = below.1 + self.config.fan_offset_y - origin.1;
        for card in cards[start..].iter_mut() {
            card.location = (card.location.0 + dx, card.location.1 + dy);
        }
    }

    /// Perceives the board only if some stack is waiting for a reveal.
    fn reveal_pending(&mut self, report: &mut PassReport) -> Result<()> {
        if let Some(stack) = (0..TOTAL_STACKS).find(|&s| self.board.stacks[s].can_reveal()) {
            self.execute(Move::Reveal(stack), report)?;
        }
        Ok(())
    }

    /// Runs one perception pass: refreshes known cards' locations and reveals
    /// onto every stack that was waiting for it. Returns the revealed columns.
    fn observe(&mut self) -> Result<Vec<usize>> {
        let detections = self.perception.detect_cards()?;
        let mut revealed = vec![];
        for Detection { column, card } in detections {
            if self.board.refresh_location(&card) {
                continue;
            }
            if !self.board.stacks.get(column).is_some_and(|s| s.can_reveal()) {
                debug!("Ignoring unexpected {card} on stack {column}");
                continue;
            }
            match self.board.reveal(column, card) {
                Ok(()) => {
                    info!("Revealing {card} on stack {column}");
                    revealed.push(column);
                }
                Err(err) if !err.is_fatal() => warn!("{err}"),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(revealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoplay::tests::{Input, Recorder};
    use crate::board::Suit;
    use crate::config::TimingConfig;
    use std::collections::VecDeque;

    /// Replays canned observations; runs dry as an empty board and an unreadable deck.
    #[derive(Default)]
    struct Script {
        boards: VecDeque<Vec<Detection>>,
        decks: VecDeque<Option<Card>>,
    }

    impl Perception for Script {
        fn detect_cards(&mut self) -> Result<Vec<Detection>> {
            Ok(self.boards.pop_front().unwrap_or_default())
        }

        fn detect_deck(&mut self) -> Result<Option<Card>> {
            Ok(self.decks.pop_front().flatten())
        }
    }

    fn card(label: &str, suit: Suit, location: Point) -> Card {
        Card::from_label(label, suit, location).unwrap()
    }

    fn config() -> Config {
        Config {
            timing: TimingConfig {
                draw_ms: 0,
                foundation_ms: 0,
                drag_leg_ms: 0,
                click_hold_ms: 0,
                observe_delay_ms: 0,
                observe_retries: 1,
                new_deal_ms: 0,
            },
            ..Config::default()
        }
    }

    /// A board with no face-down cards and `deck_size` unseen deck cards.
    fn open_board(deck_size: usize) -> Board {
        let mut board = Board::new(deck_size);
        for stack in board.stacks.iter_mut() {
            stack.hidden = 0;
        }
        board
    }

    fn game(script: Script, recorder: Recorder, board: Board) -> Game<Script, Recorder> {
        Game::with_board(script, recorder, config(), board)
    }

    #[test]
    fn test_new_seeds_from_first_pass() {
        let ace = card("A", Suit::Diamonds, (1000, 400));
        let script = Script {
            boards: [vec![
                Detection { column: 0, card: ace },
                Detection { column: 4, card: ace },
                Detection { column: 4, card: card("9", Suit::Clubs, (1500, 500)) },
            ]]
            .into(),
            ..Default::default()
        };
        let game = Game::new(script, Recorder::default(), config()).unwrap();
        assert_eq!(game.board().stacks[0].cards.as_slice(), [ace]);
        assert_eq!(game.board().stacks[4].len(), 1);
        assert_eq!(game.board().stacks[4].hidden, 4);
    }

    #[test]
    fn test_ace_goes_home_then_reveals() {
        let mut board = open_board(0);
        board.stacks[0].hidden = 2;
        board.seed(0, card("A", Suit::Diamonds, (1000, 400)));
        let five = card("5", Suit::Spades, (1000, 370));
        let script = Script {
            boards: [vec![Detection { column: 0, card: five }]].into(),
            ..Default::default()
        };

        let mut game = game(script, Recorder::default(), board);
        let report = game.step().unwrap();
        assert_eq!((report.foundations, report.reveals), (1, 1));
        assert_eq!(game.board().foundations, [1, 0, 0, 0]);
        assert_eq!(game.board().stacks[0].cards.as_slice(), [five]);
        assert_eq!(game.board().stacks[0].hidden, 1);
        assert_eq!(game.history(), [Move::StackToFoundation(0), Move::Reveal(0)]);

        let (_, recorder) = game.into_parts();
        assert_eq!(
            recorder.inputs,
            [Input::Click((1000, 400), ClickMode::Right)]
        );
    }

    #[test]
    fn test_failed_reveal_does_not_loop() {
        let mut board = open_board(0);
        board.stacks[3].hidden = 3;
        let mut game = game(Script::default(), Recorder::default(), board);
        let summary = game.run(20).unwrap();
        assert_eq!(summary.passes, 1);
        assert_eq!(game.board().stacks[3].hidden, 3);
    }

    #[test]
    fn test_run_ends_when_nothing_moves() {
        let mut board = open_board(0);
        board.seed(0, card("9", Suit::Clubs, (1000, 400)));
        board.seed(1, card("5", Suit::Hearts, (1150, 400)));

        let mut game = game(Script::default(), Recorder::default(), board);
        let summary = game.run(20).unwrap();
        assert_eq!(summary.passes, 1);
        assert!(summary.total.is_idle());
        assert!(!summary.won);
        assert!(game.history().is_empty());
        assert!(game.into_parts().1.inputs.is_empty());
    }

    #[test]
    fn test_deck_cycles_without_duplicates() {
        let mut board = open_board(3);
        board.seed(0, card("K", Suit::Clubs, (1000, 400)));
        let drawn = [
            card("4", Suit::Clubs, (1200, 120)),
            card("9", Suit::Hearts, (1220, 120)),
            card("J", Suit::Spades, (1240, 120)),
        ];
        let script = Script {
            decks: drawn.iter().copied().map(Some).collect(),
            ..Default::default()
        };

        let mut game = game(script, Recorder::default(), board);
        let first = game.step().unwrap();
        assert_eq!(first.draws, 3);
        assert!(first.is_idle());
        assert!(game.board().deck.is_fully_known());

        let second = game.step().unwrap();
        assert_eq!(second.draws, 3);
        let deck = &game.board().deck;
        assert_eq!(deck.cards(), drawn);
        assert_eq!((deck.index(), deck.draw_count()), (2, 3));

        // One extra click turns the waste back over
        let stock = config().stock;
        let (_, recorder) = game.into_parts();
        assert_eq!(recorder.inputs.len(), 7);
        assert!(
            recorder
                .inputs
                .iter()
                .all(|input| *input == Input::Click(stock, ClickMode::Left))
        );
    }

    #[test]
    fn test_repeated_deck_card_stops_the_run() {
        let four = card("4", Suit::Clubs, (1200, 120));
        let script = Script {
            decks: [Some(four), Some(four), Some(four)].into(),
            ..Default::default()
        };
        let mut game = game(script, Recorder::default(), open_board(3));
        let err = game.run(20).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlayError>(),
            Some(PlayError::DeckAnomaly(_))
        ));
        assert_eq!(game.board().deck.cards(), [four]);
    }

    #[test]
    fn test_deck_sweep_finishes_before_placement() {
        let mut board = open_board(2);
        board.seed(0, card("K", Suit::Clubs, (1000, 400)));
        let queen = card("Q", Suit::Hearts, (1200, 120));
        let ace = card("A", Suit::Clubs, (1220, 120));
        let script = Script {
            decks: [Some(queen), Some(ace)].into(),
            ..Default::default()
        };

        let mut game = game(script, Recorder::default(), board);
        let report = game.step().unwrap();
        assert_eq!(game.board().foundations, [0, 0, 0, 1]);
        assert_eq!((report.foundations, report.tableau_moves), (1, 1));
        assert!(game.board().deck.is_empty());
        assert_eq!(game.board().stacks[0].peek_top(), Some(&queen));
        assert_eq!(
            game.history(),
            [
                Move::Draw,
                Move::Draw,
                Move::DeckToFoundation,
                Move::Draw,
                Move::DeckToStack(0),
            ]
        );
    }

    #[test]
    fn test_deck_card_goes_to_tableau() {
        let mut board = open_board(1);
        board.seed(2, card("K", Suit::Clubs, (1300, 450)));
        let queen = card("Q", Suit::Hearts, (1200, 120));
        let script = Script {
            decks: [Some(queen)].into(),
            ..Default::default()
        };

        let mut game = game(script, Recorder::default(), board);
        let report = game.step().unwrap();
        assert_eq!((report.draws, report.tableau_moves), (1, 1));
        assert!(game.board().deck.is_empty());
        let stack = &game.board().stacks[2];
        assert_eq!(stack.peek_top(), Some(&queen));
        assert_eq!(stack.peek_top().map(|c| c.location), Some((1300, 480)));

        let (_, recorder) = game.into_parts();
        assert_eq!(
            recorder.inputs,
            [
                Input::Click(config().stock, ClickMode::Left),
                Input::Drag((1200, 120), (1307, 450)),
            ]
        );
    }

    #[test]
    fn test_tableau_move_shifts_locations() {
        let mut board = open_board(0);
        board.seed(0, card("6", Suit::Hearts, (1000, 400)));
        board.seed(0, card("5", Suit::Clubs, (1000, 430)));
        board.seed(3, card("7", Suit::Spades, (1400, 350)));

        let mut game = game(Script::default(), Recorder::default(), board);
        let report = game.step().unwrap();
        assert_eq!(report.tableau_moves, 1);
        assert!(game.board().stacks[0].is_empty());
        let moved: Vec<_> = game.board().stacks[3]
            .cards
            .iter()
            .map(|c| (c.pretty_print(), c.location))
            .collect();
        assert_eq!(
            moved,
            [
                ("7S".to_string(), (1400, 350)),
                ("6H".to_string(), (1400, 380)),
                ("5C".to_string(), (1400, 410)),
            ]
        );

        let (_, recorder) = game.into_parts();
        assert_eq!(recorder.inputs, [Input::Drag((1000, 400), (1440, 350))]);
    }

    #[test]
    fn test_actuation_failure_is_fatal() {
        let mut board = open_board(0);
        board.seed(0, card("A", Suit::Diamonds, (1000, 400)));
        let recorder = Recorder {
            fail_at: Some(0),
            ..Default::default()
        };

        let mut game = game(Script::default(), recorder, board);
        let err = game.run(20).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlayError>(),
            Some(PlayError::Actuation(_))
        ));
        assert_eq!(game.board().foundations, [0; 4]);
        assert!(game.history().is_empty());
    }
}
