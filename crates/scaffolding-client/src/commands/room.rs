//! `room` subcommands: join code generation and inspection.

use scaffolding_core::RoomId;

use crate::error::ClientResult;

/// Prints a freshly generated join code.
pub fn new() -> ClientResult<()> {
    print!("{}", describe(&RoomId::generate()));
    Ok(())
}

/// Validates `code` and prints its network pair.
pub fn parse(code: &str) -> ClientResult<()> {
    let room = RoomId::parse(code.trim())?;
    print!("{}", describe(&room));
    Ok(())
}

/// Renders a room's join code and derived transport pair.
pub fn describe(room: &RoomId) -> String {
    format!(
        "code:    {}\nnetwork: {}\nsecret:  {}\n",
        room.code(),
        room.network_name(),
        room.network_secret()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn describe_known_code() {
        let room = RoomId::parse("U/YNZE-U61D-2206-HXRG").unwrap();
        insta::assert_snapshot!(describe(&room).trim_end(), @r"
        code:    U/YNZE-U61D-2206-HXRG
        network: scaffolding-mc-YNZE-U61D
        secret:  2206-HXRG
        ");
    }

    #[test]
    fn parse_rejects_malformed_code() {
        assert!(matches!(parse("U/YNZE"), Err(ClientError::RoomCode(_))));
        assert!(parse(" U/YNZE-U61D-2206-HXRG ").is_ok());
    }
}
