//! Interactive shell: line-oriented commands driving the client session, and
//! pretty-printing of received messages.

use tokio::io::{AsyncRead, AsyncWrite};

use orp::client::{Error, Event, Session};
use orp::protocol::{DataType, FileEvent, Message, PacketType, ProtocolVersion, Status};


const HELP: &str = "\
Syntax:
\thelp
\tquit
\tcreate input|output|sensor trig|bool|num|str|json <path> [<units>]
\tdelete resource|handler|sensor <path>
\tadd handler <path>
\tpush trig|bool|num|str|json <path> <timestamp> [<data>] (note: if <timestamp> = 0, current timestamp will be used)
\tget <path>
\texample json <path> [<data>]
\treply handler|sensor|control|data <status>
\tsync syn|synack|ack [-v <version>] [-s <sent>] [-r <received>] [-m <mtu>]
\tfile control info|ready|pending|start|suspend|resume|abort [<name-or-data>] [-a <size>] [-f <local>]
\tfile data <bytes>";


/// Parse and execute one command line. Returns `false` when the user quits.
pub async fn dispatch<T>(session: &mut Session<T>, line: &str) -> bool
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    if line.is_empty() {
        return true;
    }

    let (cmd, rest) = split_word(line);

    // Prefix matching, in the same order commands are listed in the help
    let result = if matches(cmd, "create") {
        cmd_create(session, rest).await
    } else if matches(cmd, "delete") {
        cmd_delete(session, rest).await
    } else if matches(cmd, "add") {
        cmd_add(session, rest).await
    } else if matches(cmd, "push") {
        cmd_push(session, rest).await
    } else if matches(cmd, "get") {
        cmd_get(session, rest).await
    } else if matches(cmd, "example") {
        cmd_example(session, rest).await
    } else if matches(cmd, "reply") {
        cmd_reply(session, rest).await
    } else if matches(cmd, "sync") {
        cmd_sync(session, rest).await
    } else if matches(cmd, "file") {
        cmd_file(session, rest).await
    } else if matches(cmd, "help") {
        println!("{HELP}");
        Ok(())
    } else if matches(cmd, "quit") {
        return false;
    } else {
        println!("Unrecognized command: {cmd}");
        Ok(())
    };

    if let Err(e) = result {
        println!("Failed to send request: {e}");
    }

    true
}

/* Create a resource:
 * > create input|output|sensor trig|bool|num|str|json <path> [<units>]
 */
async fn cmd_create<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let args: Vec<&str> = args.split_whitespace().collect();
    if args.len() < 3 || args.len() > 4 {
        println!("Invalid number of arguments {}", args.len());
        return Ok(());
    }

    let Some(data_type) = data_type_read(args[1]) else {
        return Ok(());
    };
    let path = args[2];
    let units = args.get(3).copied().unwrap_or("");

    match args[0].chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('i') => session.create_resource(true, path, data_type, units).await,
        Some('o') => session.create_resource(false, path, data_type, units).await,
        Some('s') => session.create_sensor(path, data_type, units).await,
        _ => {
            println!("Invalid resource type {}", args[0]);
            Ok(())
        },
    }
}

/* Delete a resource, handler, or sensor:
 * > delete resource|handler|sensor <path>
 */
async fn cmd_delete<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let args: Vec<&str> = args.split_whitespace().collect();
    if args.len() != 2 {
        println!("Invalid number of arguments {}", args.len());
        return Ok(());
    }

    match args[0].chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('r') => session.delete_resource(args[1]).await,
        Some('h') => session.remove_push_handler(args[1]).await,
        Some('s') => session.remove_sensor(args[1]).await,
        _ => {
            println!("Unrecognized type: {}", args[0]);
            Ok(())
        },
    }
}

/* Add a push handler on a resource:
 * > add handler <path>
 */
async fn cmd_add<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let args: Vec<&str> = args.split_whitespace().collect();
    if args.len() != 2 {
        println!("Invalid number of arguments {}", args.len());
        return Ok(());
    }
    if !matches(args[0], "handler") {
        println!("Unrecognized type: {}", args[0]);
        return Ok(());
    }

    session.add_push_handler(args[1]).await
}

/* Push a value to a resource. The data argument may contain spaces:
 * > push trig|bool|num|str|json <path> <timestamp> [<data>]
 */
async fn cmd_push<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (head, data) = split_words(args, 3);
    if head.len() != 3 {
        println!("Invalid number of arguments {}", head.len());
        return Ok(());
    }

    let Some(data_type) = data_type_read(head[0]) else {
        return Ok(());
    };
    let path = head[1];

    let Ok(timestamp) = head[2].parse::<f64>() else {
        println!("Invalid timestamp {}", head[2]);
        return Ok(());
    };
    let timestamp = if timestamp == 0.0 {
        now_epoch()
    } else if timestamp < 0.0 {
        None
    } else {
        Some(timestamp)
    };

    session.push(path, data_type, timestamp, data).await
}

/* Get the value of a resource:
 * > get <path>
 */
async fn cmd_get<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let args: Vec<&str> = args.split_whitespace().collect();
    if args.len() != 1 {
        println!("Invalid number of arguments {}", args.len());
        return Ok(());
    }

    session.get(args[0]).await
}

/* Set the JSON example of a resource:
 * > example json <path> [<data>]
 */
async fn cmd_example<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (head, data) = split_words(args, 2);
    if head.len() != 2 {
        println!("Invalid number of arguments {}", head.len());
        return Ok(());
    }
    if data_type_read(head[0]) != Some(DataType::Json) {
        return Ok(());
    }

    session.set_json_example(head[1], data.unwrap_or("")).await
}

/* Respond to a notification or unsolicited packet:
 * > reply handler|sensor|control|data <status>
 */
async fn cmd_reply<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let args: Vec<&str> = args.split_whitespace().collect();
    if args.is_empty() || args.len() > 2 {
        println!("Invalid number of arguments {}", args.len());
        return Ok(());
    }

    let mut status = Status::Ok;
    if let Some(arg) = args.get(1) {
        let code = arg.parse::<i32>().ok().and_then(Status::from_code);
        let Some(code) = code else {
            println!("Invalid status {arg}");
            return Ok(());
        };
        status = code;
    }

    let kind = if matches(args[0], "handler") {
        PacketType::HandlerCallResp
    } else if matches(args[0], "sensor") {
        PacketType::SensorCallResp
    } else if matches(args[0], "control") {
        PacketType::FileControlResp
    } else if matches(args[0], "data") {
        PacketType::FileDataResp
    } else {
        println!("Unknown response type {}", args[0]);
        return Ok(());
    };

    session.respond(kind, status).await
}

/* Send a sync packet:
 * > sync syn|synack|ack [-v <version>] [-s <sent>] [-r <received>] [-m <mtu>]
 */
async fn cmd_sync<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let args: Vec<&str> = args.split_whitespace().collect();
    let Some(first) = args.first() else {
        println!("Invalid number of arguments 0");
        return Ok(());
    };

    // longest match first: "syn" is a prefix of "synack"
    let kind = if matches(first, "synack") {
        PacketType::SyncSynAck
    } else if matches(first, "ack") {
        PacketType::SyncAck
    } else if matches(first, "syn") {
        PacketType::SyncSyn
    } else {
        println!("Unknown sync type {first}");
        return Ok(());
    };

    let mut version = session.version();
    let mut sent = None;
    let mut received = None;
    let mut mtu = None;

    let mut iter = args[1..].iter();
    while let Some(flag) = iter.next() {
        let Some(value) = iter.next() else {
            println!("Option {flag} requires a value");
            return Ok(());
        };

        match *flag {
            "-v" => {
                let parsed = value.parse::<u8>().ok().and_then(|v| ProtocolVersion::try_from(v).ok());
                let Some(parsed) = parsed else {
                    println!("Invalid version {value}");
                    return Ok(());
                };
                version = parsed;
            },
            "-s" => match value.parse() {
                Ok(v) => sent = Some(v),
                Err(_) => {
                    println!("Invalid sent count {value}");
                    return Ok(());
                },
            },
            "-r" => match value.parse() {
                Ok(v) => received = Some(v),
                Err(_) => {
                    println!("Invalid received count {value}");
                    return Ok(());
                },
            },
            "-m" => match value.parse() {
                Ok(v) => mtu = Some(v),
                Err(_) => {
                    println!("Invalid MTU {value}");
                    return Ok(());
                },
            },
            flag => {
                println!("Unknown option {flag}");
                return Ok(());
            },
        }
    }

    session.sync(kind, version, sent, received, mtu).await
}

/* File transfer:
 * > file control info|ready|pending|start|suspend|resume|abort [<name-or-data>] [-a <size>] [-f <local>]
 * > file data <bytes>
 */
async fn cmd_file<T>(session: &mut Session<T>, args: &str) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (sub, rest) = split_word(args);

    if matches(sub, "data") {
        if rest.is_empty() {
            println!("Invalid number of arguments 0");
            return Ok(());
        }
        return session.file_data(rest.as_bytes()).await;
    }

    if !matches(sub, "control") {
        println!("Unrecognized type: {sub}");
        return Ok(());
    }

    let args: Vec<&str> = rest.split_whitespace().collect();
    let Some(first) = args.first() else {
        println!("Invalid number of arguments 0");
        return Ok(());
    };

    let Some(event) = file_event_read(first) else {
        println!("Unknown file event {first}");
        return Ok(());
    };

    let mut name = None;
    let mut size = None;
    let mut local = None;

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "-a" => {
                let parsed = iter.next().and_then(|v| v.parse::<u64>().ok());
                let Some(parsed) = parsed else {
                    println!("Option -a requires a size");
                    return Ok(());
                };
                size = Some(parsed);
            },
            "-f" => {
                let Some(value) = iter.next() else {
                    println!("Option -f requires a file name");
                    return Ok(());
                };
                local = Some(*value);
            },
            arg => name = Some(arg),
        }
    }

    // A start notification also prepares local storage: the file is written
    // as packets arrive when a size was given (auto mode), or on explicit
    // acknowledgements otherwise.
    if event == FileEvent::Start {
        match local.or(name) {
            Some(target) => session.file().setup(target, size.unwrap_or(0), size.is_some()),
            None => {
                println!("File name required for start");
                return Ok(());
            },
        }
    }

    session.file_notify(event, name).await
}

fn file_event_read(word: &str) -> Option<FileEvent> {
    if matches(word, "info") {
        Some(FileEvent::Info)
    } else if matches(word, "ready") {
        Some(FileEvent::Ready)
    } else if matches(word, "pending") {
        Some(FileEvent::Pending)
    } else if matches(word, "start") {
        Some(FileEvent::Start)
    } else if matches(word, "suspend") {
        Some(FileEvent::Suspend)
    } else if matches(word, "resume") {
        Some(FileEvent::Resume)
    } else if matches(word, "abort") {
        Some(FileEvent::Abort)
    } else {
        None
    }
}

fn data_type_read(word: &str) -> Option<DataType> {
    match word.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('t') => Some(DataType::Trigger),
        Some('b') => Some(DataType::Boolean),
        Some('n') => Some(DataType::Numeric),
        Some('s') => Some(DataType::String),
        Some('j') => Some(DataType::Json),
        _ => {
            println!("Invalid data type: {word}");
            None
        },
    }
}

fn now_epoch() -> Option<f64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

/// Case-insensitive prefix match, so commands may be abbreviated.
fn matches(word: &str, full: &str) -> bool {
    !word.is_empty() && word.len() <= full.len() && full[..word.len()].eq_ignore_ascii_case(word)
}

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// Split off up to `n` words, returning them and the remaining tail. Used for
/// commands whose final argument may contain spaces.
fn split_words(s: &str, n: usize) -> (Vec<&str>, Option<&str>) {
    let mut words = Vec::new();
    let mut rest = s;

    for _ in 0..n {
        let (word, tail) = split_word(rest);
        if word.is_empty() {
            break;
        }
        words.push(word);
        rest = tail;
    }

    let tail = rest.trim();
    (words, (!tail.is_empty()).then_some(tail))
}


pub fn print_event(event: &Event) {
    match event {
        Event::Message(msg) => print_message(msg),
        Event::Raw(bytes) => {
            println!("\nReceived: '{}'", String::from_utf8_lossy(bytes).trim_end());
        },
    }
}

fn print_message(msg: &Message) {
    println!("\nReceived:");
    println!("\tType     : {}", msg.kind.name());

    match msg.kind {
        // byte 1 is unused on these notification packets
        PacketType::HandlerCall | PacketType::SensorCall => {},

        PacketType::FileControl => {
            println!("\tEvent    : {:?}", msg.event);
        },

        kind if kind.is_sync() => {
            println!("\tVersion  : {:?}", msg.version);
        },

        kind if kind.is_response() => {
            println!("\tStatus   : {} ({})", msg.status.code(), msg.status);
        },

        _ => {
            println!("\tData type: {:?}", msg.data_type);
        },
    }

    println!("\tSequence : {}", msg.sequence);

    if let Some(ts) = msg.timestamp {
        println!("\tTimestamp: {ts:?}");
    }
    if !msg.path.is_empty() {
        println!("\tPath     : {}", msg.path);
    }
    if !msg.unit.is_empty() {
        println!("\tUnits    : {}", msg.unit);
    }

    // file transfer data can be binary, do not print it
    if !msg.data.is_empty() && msg.kind != PacketType::FileData {
        println!("\tData     : {}", String::from_utf8_lossy(&msg.data));
    }

    if msg.kind.is_sync() {
        if let Some(mtu) = msg.mtu {
            println!("\tMTU      : {mtu}");
        }
        if let Some(sent) = msg.sent_count {
            println!("\tSent     : {sent}");
        }
        if let Some(received) = msg.received_count {
            println!("\tReceived : {received}");
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        assert!(matches("c", "create"));
        assert!(matches("CREATE", "create"));
        assert!(matches("cre", "create"));
        assert!(!matches("created", "create"));
        assert!(!matches("", "create"));
        assert!(!matches("x", "create"));
    }

    #[test]
    fn test_split_words_tail() {
        let (words, tail) = split_words("num /a/b 0 hello world", 3);
        assert_eq!(words, ["num", "/a/b", "0"]);
        assert_eq!(tail, Some("hello world"));

        let (words, tail) = split_words("num /a/b 0", 3);
        assert_eq!(words, ["num", "/a/b", "0"]);
        assert_eq!(tail, None);
    }

    #[test]
    fn test_data_type_read() {
        assert_eq!(data_type_read("num"), Some(DataType::Numeric));
        assert_eq!(data_type_read("JSON"), Some(DataType::Json));
        assert_eq!(data_type_read("x"), None);
    }
}
