//! Numeric reply codes used by the engine.

pub const RPL_WELCOME: u16 = 1;
pub const RPL_YOURHOST: u16 = 2;
pub const RPL_ISUPPORT: u16 = 5;
pub const RPL_ADMINME: u16 = 256;
pub const RPL_ADMINLOC1: u16 = 257;
pub const RPL_ADMINLOC2: u16 = 258;
pub const RPL_ADMINEMAIL: u16 = 259;
pub const RPL_TRYAGAIN: u16 = 263;
pub const RPL_AWAY: u16 = 301;
pub const RPL_USERHOST: u16 = 302;
pub const RPL_ISON: u16 = 303;
pub const RPL_UNAWAY: u16 = 305;
pub const RPL_NOWAWAY: u16 = 306;
pub const RPL_WHOISUSER: u16 = 311;
pub const RPL_WHOISSERVER: u16 = 312;
pub const RPL_WHOISOPERATOR: u16 = 313;
pub const RPL_WHOWASUSER: u16 = 314;
pub const RPL_ENDOFWHO: u16 = 315;
pub const RPL_WHOISIDLE: u16 = 317;
pub const RPL_ENDOFWHOIS: u16 = 318;
pub const RPL_WHOISCHANNELS: u16 = 319;
pub const RPL_LISTSTART: u16 = 321;
pub const RPL_LIST: u16 = 322;
pub const RPL_LISTEND: u16 = 323;
pub const RPL_CHANNELMODEIS: u16 = 324;
pub const RPL_UNIQOPIS: u16 = 325;
pub const RPL_LOGGEDINAS: u16 = 330;
pub const RPL_TOPIC: u16 = 332;
pub const RPL_INVITELIST: u16 = 346;
pub const RPL_EXCEPTLIST: u16 = 348;
pub const RPL_VERSION: u16 = 351;
pub const RPL_WHOREPLY: u16 = 352;
pub const RPL_NAMREPLY: u16 = 353;
pub const RPL_LINKS: u16 = 364;
pub const RPL_ENDOFNAMES: u16 = 366;
pub const RPL_BANLIST: u16 = 367;
pub const RPL_MOTD: u16 = 372;
pub const RPL_MOTDSTART: u16 = 375;
pub const RPL_ENDOFMOTD: u16 = 376;
pub const RPL_YOUREOPER: u16 = 381;
pub const RPL_REHASHING: u16 = 382;
pub const RPL_TIME: u16 = 391;
pub const ERR_UNKNOWNCOMMAND: u16 = 421;
pub const ERR_NOMOTD: u16 = 422;
pub const ERR_NICKNAMEINUSE: u16 = 433;
pub const ERR_BADCHANNELKEY: u16 = 475;
pub const RPL_SECURECONNECTION: u16 = 671;

/// Replies worth showing to the user as plain server text when no handler
/// claimed them. Every error numeric qualifies.
pub fn is_displayed(code: u16) -> bool {
    matches!(
        code,
        RPL_ADMINME
            | RPL_ADMINLOC1
            | RPL_ADMINLOC2
            | RPL_ADMINEMAIL
            | RPL_TRYAGAIN
            | RPL_USERHOST
            | RPL_UNAWAY
            | RPL_NOWAWAY
            | RPL_WHOWASUSER
            | RPL_UNIQOPIS
            | RPL_INVITELIST
            | RPL_WHOISSERVER
            | RPL_ISON
            | RPL_EXCEPTLIST
            | RPL_VERSION
            | RPL_WHOREPLY
            | RPL_LINKS
            | RPL_BANLIST
            | RPL_YOUREOPER
            | RPL_REHASHING
            | RPL_TIME
            | RPL_MOTDSTART
            | RPL_MOTD
            | RPL_CHANNELMODEIS
            | RPL_LISTSTART
            | RPL_LIST
    ) || is_error(code)
}

pub fn is_error(code: u16) -> bool {
    code >= 400
}
