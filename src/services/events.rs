use crate::models::{Booking, BookingEvent};
use crate::state::AppState;

pub fn publish(state: &AppState, kind: &str, booking: &Booking) {
    let event = BookingEvent::from_booking(kind, booking);
    // No subscribers is the normal case when nobody watches the queue board
    if state.booking_tx.send(event).is_err() {
        tracing::debug!(booking_id = %booking.id, kind, "no queue subscribers");
    }
}
