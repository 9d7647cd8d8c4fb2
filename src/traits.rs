/// A Mealy machine coalgebra: `(State, Event) → (State, Vec<Command>)`.
///
/// The connectivity machine implements this with a pure transition: no I/O
/// and no clock reads. Side effects are returned as commands and carried out
/// by the hosting service.
pub trait MealyMachine: Sized {
    type Event;
    type Command;
    fn transition(self, event: Self::Event) -> (Self, Vec<Self::Command>);
}
