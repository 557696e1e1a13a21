#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Browsing,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Up,
    Down,
    First,
    Last,
    Activate,
    // Row index.
    Click(usize),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Open(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Explicit,
    OnMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub state: State,
    pub selected: usize,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            state: State::Browsing,
            selected: 0,
        }
    }
}

pub fn dispatch(cursor: Cursor, input: Input, len: usize, activation: Activation) -> (Cursor, Effect) {
    if cursor.state == State::Exiting {
        return (cursor, Effect::None);
    }
    if input == Input::Quit {
        return (exiting(cursor.selected), Effect::None);
    }
    if len == 0 {
        return (cursor, Effect::None);
    }

    let last = len - 1;
    let current = cursor.selected.min(last);
    let target = match input {
        Input::Up => current.saturating_sub(1),
        Input::Down => (current + 1).min(last),
        Input::First => 0,
        Input::Last => last,
        Input::Click(index) if index > last => return (cursor, Effect::None),
        Input::Click(index) if index == current => return activate(current),
        Input::Click(index) => index,
        Input::Activate => return activate(current),
        Input::Quit => return (exiting(current), Effect::None),
    };

    if activation == Activation::OnMove && target != current {
        return activate(target);
    }

    (
        Cursor {
            state: State::Browsing,
            selected: target,
        },
        Effect::None,
    )
}

fn activate(index: usize) -> (Cursor, Effect) {
    (exiting(index), Effect::Open(index))
}

fn exiting(selected: usize) -> Cursor {
    Cursor {
        state: State::Exiting,
        selected,
    }
}
