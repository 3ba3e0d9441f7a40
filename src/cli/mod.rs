//! CLI 모듈
//!
//! sotax-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncBufReadExt;

use crate::chain::{ConversationChain, DEFAULT_SESSION_ID};
use crate::config::{has_api_key, AppConfig};
use crate::corpus;
use crate::knowledge::Retriever;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "sotax-rag")]
#[command(version, about = "소득세법 대화형 RAG 챗봇", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 벡터 인덱스에 추가
    Ingest {
        /// 수집할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// 단일 질문에 답변 (스트리밍 출력)
    Ask {
        /// 질문
        question: String,

        /// 세션 ID (기본값: 고정 세션)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// 대화형 멀티턴 채팅
    Chat {
        /// 세션 ID (미지정 시 새 세션 생성)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// 인덱스에서 출처 기준 삭제
    Delete {
        /// 삭제할 출처 라벨
        source: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest { file, dir } => cmd_ingest(file, dir).await,
        Commands::Ask { question, session } => cmd_ask(&question, session).await,
        Commands::Chat { session } => cmd_chat(session).await,
        Commands::Delete { source } => cmd_delete(&source).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// API 키 미설정 시 안내와 함께 종료
fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export OPENAI_API_KEY=your-api-key\n\n\
             API 키 발급: https://platform.openai.com/api-keys"
        );
    }
    Ok(())
}

/// 말뭉치 수집 명령어 (ingest)
///
/// 파일 또는 폴더에서 텍스트를 추출하여 벡터 인덱스에 저장합니다.
async fn cmd_ingest(file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    require_api_key()?;

    let files = if let Some(ref file_path) = file {
        match corpus::collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        corpus::collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    println!("[*] 수집 대상: {} 파일", files.len());

    let config = AppConfig::from_env();
    let retriever = Retriever::from_config(&config)
        .await
        .context("Retriever 초기화 실패")?;

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, corpus_file) in files.iter().enumerate() {
        let file_name = corpus_file
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        print!("[{}/{}] {}... ", i + 1, files.len(), file_name);
        std::io::stdout().flush().ok();

        // 텍스트 추출
        let docs = match corpus::extract(corpus_file).await {
            Ok(d) => d,
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
                continue;
            }
        };

        // 문서별 청킹·임베딩·저장 (PDF는 페이지별)
        let mut chunk_total = 0;
        let mut skipped = 0;
        let mut failed = false;
        for doc in docs {
            // 이미 인덱스된 출처는 건너뜀
            match retriever.has_document(&doc.source).await {
                Ok(true) => {
                    skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    println!("인덱스 확인 실패: {}", e);
                    error_count += 1;
                    failed = true;
                    break;
                }
            }

            match retriever.index_document(&doc.source, &doc.text).await {
                Ok(n) => chunk_total += n,
                Err(e) => {
                    println!("저장 실패: {}", e);
                    error_count += 1;
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            if chunk_total == 0 && skipped > 0 {
                println!("건너뜀 (이미 인덱스됨)");
            } else {
                println!("완료 ({} 청크)", chunk_total);
            }
            success_count += 1;
        }
    }

    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success_count, error_count);

    Ok(())
}

/// 단일 질문 명령어 (ask)
///
/// 질문 하나를 파이프라인에 태우고 답변을 스트리밍 출력합니다.
async fn cmd_ask(question: &str, session: Option<String>) -> Result<()> {
    require_api_key()?;

    let config = AppConfig::from_env();
    let chain = ConversationChain::from_config(&config)
        .await
        .context("파이프라인 초기화 실패")?;

    let session_id = session.unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    stream_answer(&chain, question, &session_id).await
}

/// 대화형 채팅 명령어 (chat)
///
/// 같은 세션으로 여러 턴을 주고받습니다. 빈 줄 또는 "exit"로 종료합니다.
async fn cmd_chat(session: Option<String>) -> Result<()> {
    require_api_key()?;

    let config = AppConfig::from_env();
    let chain = ConversationChain::from_config(&config)
        .await
        .context("파이프라인 초기화 실패")?;

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("소득세법 챗봇 (세션: {})", session_id);
    println!("질문을 입력하세요. 종료: 빈 줄 또는 \"exit\"\n");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };

        let question = line.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            break;
        }

        if let Err(e) = stream_answer(&chain, question, &session_id).await {
            eprintln!("[!] 요청 실패: {:#}", e);
        }
    }

    println!("대화를 종료합니다.");
    Ok(())
}

/// 답변 스트림을 표준 출력으로 중계
async fn stream_answer(chain: &ConversationChain, question: &str, session_id: &str) -> Result<()> {
    let mut stream = chain.answer(question, session_id).await?;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment.context("답변 스트림 에러")?;
        print!("{}", fragment);
        std::io::stdout().flush().ok();
    }

    println!();
    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(source: &str) -> Result<()> {
    require_api_key()?;

    let config = AppConfig::from_env();
    let retriever = Retriever::from_config(&config)
        .await
        .context("Retriever 초기화 실패")?;

    let deleted = retriever
        .delete_document(source)
        .await
        .context("삭제 실패")?;

    if deleted > 0 {
        println!("[OK] '{}' 청크 {} 건 삭제됨", source, deleted);
    } else {
        println!("[!] 삭제할 청크를 찾을 수 없습니다");
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("sotax-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = AppConfig::from_env();
    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 챗 모델: {}", config.chat_model);
    println!("[*] 임베딩 모델: {}", config.embedding_model);
    println!("[*] 벡터 인덱스: {}", config.index_name);

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
        return Ok(());
    }

    match Retriever::from_config(&config).await {
        Ok(retriever) => match retriever.chunk_count().await {
            Ok(count) => println!("[OK] 인덱스된 청크: {} 건", count),
            Err(e) => println!("[!] 인덱스 조회 실패: {}", e),
        },
        Err(e) => {
            tracing::debug!("Retriever 초기화 실패: {}", e);
            println!("[!] 벡터 저장소를 열 수 없습니다");
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_requires_question() {
        let result = Cli::try_parse_from(["sotax-rag", "ask"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["sotax-rag", "ask", "소득세율이 얼마인가요?"]).unwrap();
        match cli.command {
            Commands::Ask { question, session } => {
                assert_eq!(question, "소득세율이 얼마인가요?");
                assert!(session.is_none());
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn test_ingest_accepts_dir() {
        let cli = Cli::try_parse_from(["sotax-rag", "ingest", "--dir", "corpus/"]).unwrap();
        match cli.command {
            Commands::Ingest { file, dir } => {
                assert!(file.is_none());
                assert_eq!(dir.unwrap(), PathBuf::from("corpus/"));
            }
            _ => panic!("expected ingest command"),
        }
    }
}
