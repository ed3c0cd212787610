//! Room id generation.

use ulid::Ulid;

/// Short, time-ordered room id: the ten-character timestamp of a ULID followed
/// by six of its random characters.
pub fn new_room_id() -> String {
    let ulid = Ulid::new().to_string();
    ulid.chars().take(10).chain(ulid.chars().skip(20)).collect()
}
