// SPDX-License-Identifier: Apache-2.0

//! RANDAO: a random number generated by a campaign of participants who commit
//! to a secret, then reveal it. The result is the XOR of all revealed secrets.
//!
//! A campaign with target block `bnum` moves through these phases:
//!
//! ```text
//!            follow                      |
//! ---------------------------------------|
//!                   commit               |  reveal          | bounty
//! ... bnum-balkline ......... bnum-deadline ........... bnum .......
//! ```
//!
//! Consumers pay into the bounty pot when they start or follow a campaign.
//! Participants attach the campaign deposit when committing. After `bnum`,
//! revealed participants share the bounty pot and the deposits of those who
//! failed to reveal. If the campaign failed, consumers can take their bounty
//! back.

use super::{require, CallEnv, NativeContract, Revert};
use crate::{
    account::AccountId,
    value::{Args, Value},
};
use primitive_types::U256;
use std::collections::HashMap;
use tiny_keccak::{Hasher, Keccak};

/// The commitment for secret `s`: keccak256 of `s` as 32 bytes big endian.
pub fn sha_commit(s: U256) -> [u8; 32] {
    let mut secret = [0u8; 32];
    s.to_big_endian(&mut secret);

    let mut hasher = Keccak::v256();
    hasher.update(&secret);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    hash
}

#[derive(Debug, Default, Clone)]
struct Consumer {
    bountypot: u128,
}

#[derive(Debug, Default, Clone)]
struct Participant {
    secret: U256,
    commitment: [u8; 32],
    reward: u128,
    revealed: bool,
    rewarded: bool,
}

#[derive(Debug, Default, Clone)]
struct Campaign {
    bnum: u32,
    deposit: u128,
    commit_balkline: u16,
    commit_deadline: u16,

    random: U256,
    settled: bool,
    bountypot: u128,
    commit_num: u32,
    reveals_num: u32,

    consumers: HashMap<AccountId, Consumer>,
    participants: HashMap<AccountId, Participant>,
}

impl Campaign {
    fn commit_start(&self) -> u64 {
        u64::from(self.bnum) - u64::from(self.commit_balkline)
    }

    fn commit_end(&self) -> u64 {
        u64::from(self.bnum) - u64::from(self.commit_deadline)
    }

    fn follow_phase(&self, block: u64) -> bool {
        block <= self.commit_end()
    }

    fn commit_phase(&self, block: u64) -> bool {
        self.commit_start() <= block && block <= self.commit_end()
    }

    fn reveal_phase(&self, block: u64) -> bool {
        self.commit_end() < block && block < u64::from(self.bnum)
    }

    fn bounty_phase(&self, block: u64) -> bool {
        block >= u64::from(self.bnum)
    }

    /// Every committer revealed, so the random number is final.
    fn succeeded(&self) -> bool {
        self.commit_num != 0 && self.commit_num == self.reveals_num
    }

    /// Reward for one revealed participant, on top of their own deposit.
    ///
    /// The bounty pot goes to the revealers only when the campaign
    /// succeeded. A failed campaign returns the pot to its consumers through
    /// `RefundBounty`, and the revealers split the forfeited deposits.
    fn share(&self) -> u128 {
        let reveals = u128::from(self.reveals_num);

        if self.succeeded() {
            self.bountypot / reveals
        } else {
            u128::from(self.commit_num - self.reveals_num) * self.deposit / reveals
        }
    }

    fn info(&self) -> Value {
        Value::List(vec![
            Value::from(self.bnum),
            Value::from(self.deposit),
            Value::from(u32::from(self.commit_balkline)),
            Value::from(u32::from(self.commit_deadline)),
            Value::from(self.random),
            Value::Bool(self.settled),
            Value::from(self.bountypot),
            Value::from(self.commit_num),
            Value::from(self.reveals_num),
        ])
    }
}

#[derive(Debug, Default)]
pub struct Randao {
    campaigns: Vec<Campaign>,
}

impl Randao {
    pub fn boxed() -> Box<dyn NativeContract> {
        Box::<Randao>::default()
    }

    /// Campaign ids start at 1.
    fn campaign_index(&self, args: Args, index: usize) -> Result<usize, Revert> {
        let id = args.uint(index)?;

        require(
            !id.is_zero() && id <= U256::from(self.campaigns.len()),
            format!("campaign {id} does not exist"),
        )?;

        Ok(id.as_usize() - 1)
    }

    fn new_campaign(&mut self, env: &mut CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(4)?;
        let bnum = args.u32(0)?;
        let deposit = args.uint_bits(1, 96)?.low_u128();
        let commit_balkline = args.u16(2)?;
        let commit_deadline = args.u16(3)?;

        require(env.block < u64::from(bnum), "bnum must be in the future")?;
        require(commit_balkline > 0, "commit balkline must be positive")?;
        require(commit_deadline > 0, "commit deadline must be positive")?;
        require(
            commit_deadline < commit_balkline,
            "commit deadline must be before commit balkline",
        )?;
        require(
            u64::from(commit_balkline) < u64::from(bnum)
                && env.block < u64::from(bnum) - u64::from(commit_balkline),
            "too late to start campaign",
        )?;
        require(deposit > 0, "deposit must be positive")?;

        let mut campaign = Campaign {
            bnum,
            deposit,
            commit_balkline,
            commit_deadline,
            bountypot: env.value,
            ..Default::default()
        };
        campaign.consumers.insert(
            env.sender.clone(),
            Consumer {
                bountypot: env.value,
            },
        );

        self.campaigns.push(campaign);
        let id = self.campaigns.len() as u64;

        env.emit(
            "LogCampaignAdded",
            vec![
                ("campaignID", Value::from(id)),
                ("from", Value::from(env.sender)),
                ("bnum", Value::from(bnum)),
                ("deposit", Value::from(deposit)),
                ("commitBalkline", Value::from(u32::from(commit_balkline))),
                ("commitDeadline", Value::from(u32::from(commit_deadline))),
                ("bountypot", Value::from(env.value)),
            ],
        );

        Ok(Value::from(id))
    }

    fn follow(&mut self, env: &mut CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(1)?;
        let index = self.campaign_index(args, 0)?;
        let campaign = &mut self.campaigns[index];

        require(
            campaign.follow_phase(env.block),
            "too late to follow campaign",
        )?;
        require(
            !campaign.consumers.contains_key(env.sender),
            "already following campaign",
        )?;

        campaign.bountypot += env.value;
        campaign.consumers.insert(
            env.sender.clone(),
            Consumer {
                bountypot: env.value,
            },
        );

        env.emit(
            "LogFollow",
            vec![
                ("campaignID", Value::from(index as u64 + 1)),
                ("from", Value::from(env.sender)),
                ("bountypot", Value::from(env.value)),
            ],
        );

        Ok(Value::Bool(true))
    }

    fn commit(&mut self, env: &mut CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(2)?;
        let index = self.campaign_index(args, 0)?;
        let commitment = args.bytes32(1)?;
        let campaign = &mut self.campaigns[index];

        require(commitment != [0u8; 32], "commitment must not be blank")?;
        require(
            env.value == campaign.deposit,
            format!("deposit of {} required", campaign.deposit),
        )?;
        require(campaign.commit_phase(env.block), "not in commit phase")?;
        require(
            !campaign.participants.contains_key(env.sender),
            "already committed",
        )?;

        campaign.participants.insert(
            env.sender.clone(),
            Participant {
                commitment,
                ..Default::default()
            },
        );
        campaign.commit_num += 1;

        env.emit(
            "LogCommit",
            vec![
                ("campaignID", Value::from(index as u64 + 1)),
                ("from", Value::from(env.sender)),
                ("commitment", Value::from(commitment)),
            ],
        );

        Ok(Value::Unit)
    }

    fn reveal(&mut self, env: &mut CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(2)?;
        let index = self.campaign_index(args, 0)?;
        let secret = args.uint(1)?;
        let campaign = &mut self.campaigns[index];

        require(campaign.reveal_phase(env.block), "not in reveal phase")?;

        let participant = campaign
            .participants
            .get_mut(env.sender)
            .ok_or_else(|| Revert::Require("no commitment found".into()))?;

        require(
            sha_commit(secret) == participant.commitment,
            "secret does not match commitment",
        )?;
        require(!participant.revealed, "secret already revealed")?;

        participant.secret = secret;
        participant.revealed = true;
        campaign.reveals_num += 1;
        campaign.random = campaign.random ^ secret;

        env.emit(
            "LogReveal",
            vec![
                ("campaignID", Value::from(index as u64 + 1)),
                ("from", Value::from(env.sender)),
                ("secret", Value::from(secret)),
            ],
        );

        Ok(Value::Unit)
    }

    fn get_random(&self, env: &CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(1)?;
        let campaign = &self.campaigns[self.campaign_index(args, 0)?];

        require(
            campaign.bounty_phase(env.block) && campaign.succeeded(),
            "campaign is not settled",
        )?;

        Ok(Value::from(campaign.random))
    }

    fn get_my_bounty(&mut self, env: &mut CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(1)?;
        let index = self.campaign_index(args, 0)?;
        let campaign = &self.campaigns[index];

        require(campaign.bounty_phase(env.block), "not in bounty phase")?;

        let participant = campaign
            .participants
            .get(env.sender)
            .ok_or_else(|| Revert::Require("no commitment found".into()))?;

        require(!participant.rewarded, "bounty already claimed")?;

        let share = if campaign.reveals_num > 0 {
            require(participant.revealed, "secret was not revealed")?;
            campaign.share()
        } else {
            0
        };

        let payout = share + campaign.deposit;
        let sender = env.sender;
        env.transfer(sender, payout)?;

        let participant = self.campaigns[index]
            .participants
            .get_mut(sender)
            .ok_or_else(|| Revert::Require("no commitment found".into()))?;
        participant.reward = share;
        participant.rewarded = true;

        Ok(Value::from(payout))
    }

    fn refund_bounty(&mut self, env: &mut CallEnv, args: Args) -> Result<Value, Revert> {
        args.expect_len(1)?;
        let index = self.campaign_index(args, 0)?;
        let campaign = &mut self.campaigns[index];

        require(campaign.bounty_phase(env.block), "not in bounty phase")?;
        require(!campaign.succeeded(), "campaign succeeded")?;

        let bountypot = campaign
            .consumers
            .get(env.sender)
            .map(|c| c.bountypot)
            .ok_or_else(|| Revert::Require("not a consumer of this campaign".into()))?;

        require(bountypot > 0, "no bounty to refund")?;

        let sender = env.sender;
        env.transfer(sender, bountypot)?;

        campaign.bountypot -= bountypot;
        if let Some(consumer) = campaign.consumers.get_mut(sender) {
            consumer.bountypot = 0;
        }

        Ok(Value::from(bountypot))
    }
}

impl NativeContract for Randao {
    fn action(&mut self, env: &mut CallEnv, method: &str, args: Args) -> Result<Value, Revert> {
        match method {
            "NewCampaign" => self.new_campaign(env, args),
            "Follow" => self.follow(env, args),
            "Commit" => self.commit(env, args),
            "Reveal" => self.reveal(env, args),
            "GetMyBounty" => self.get_my_bounty(env, args),
            "RefundBounty" => self.refund_bounty(env, args),
            "GetRandom" => {
                let random = self.get_random(env, args)?;
                let index = self.campaign_index(args, 0)?;
                self.campaigns[index].settled = true;
                Ok(random)
            }
            _ => self.query(env, method, args),
        }
    }

    fn query(&self, env: &CallEnv, method: &str, args: Args) -> Result<Value, Revert> {
        match method {
            "GetRandom" => self.get_random(env, args),
            "ShaCommit" => {
                args.expect_len(1)?;
                Ok(Value::from(sha_commit(args.uint(0)?)))
            }
            "GetCampaign" => {
                args.expect_len(1)?;
                Ok(self.campaigns[self.campaign_index(args, 0)?].info())
            }
            "NumCampaigns" => {
                args.expect_len(0)?;
                Ok(Value::from(self.campaigns.len() as u64))
            }
            "IsConsumer" => {
                args.expect_len(2)?;
                let campaign = &self.campaigns[self.campaign_index(args, 0)?];
                let account = args.account(1)?;
                Ok(Value::Bool(campaign.consumers.contains_key(&account)))
            }
            _ => Err(Revert::UnknownMethod),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ContractHandle;

    const RANDAO: ContractHandle = ContractHandle::from_bytes([7; 20]);

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn call(
        randao: &mut Randao,
        sender: &AccountId,
        block: u64,
        value: u128,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Revert> {
        let mut env = CallEnv::new(sender, value, block, RANDAO, u128::MAX / 2);
        randao.action(&mut env, method, Args::new(args))
    }

    fn revert_reason(result: Result<Value, Revert>) -> String {
        match result {
            Err(Revert::Require(reason)) => reason,
            other => panic!("expected revert, got {other:?}"),
        }
    }

    fn campaign_args() -> Vec<Value> {
        vec![
            Value::from(9200u32),
            Value::from(200000000000u64),
            Value::from(200u32),
            Value::from(100u32),
        ]
    }

    #[test]
    fn new_campaign_time_line() {
        let mut randao = Randao::default();
        let alice = account("alice");

        assert_eq!(
            call(&mut randao, &alice, 1, 0, "NewCampaign", &campaign_args()).unwrap(),
            Value::from(1u64)
        );
        assert_eq!(
            call(&mut randao, &alice, 1, 0, "NewCampaign", &campaign_args()).unwrap(),
            Value::from(2u64)
        );

        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9000, 0, "NewCampaign", &campaign_args())),
            "too late to start campaign"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9300, 0, "NewCampaign", &campaign_args())),
            "bnum must be in the future"
        );

        let mut args = campaign_args();
        args[3] = Value::from(200u32);
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 1, 0, "NewCampaign", &args)),
            "commit deadline must be before commit balkline"
        );

        let mut args = campaign_args();
        args[1] = Value::from(0u32);
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 1, 0, "NewCampaign", &args)),
            "deposit must be positive"
        );

        let mut args = campaign_args();
        args[1] = Value::from(1u128 << 96);
        assert!(matches!(
            call(&mut randao, &alice, 1, 0, "NewCampaign", &args),
            Err(Revert::Argument(_))
        ));

        assert_eq!(randao.campaigns.len(), 2);
    }

    #[test]
    fn follow_once_per_consumer() {
        let mut randao = Randao::default();
        let alice = account("alice");
        let bob = account("bob");

        call(&mut randao, &alice, 1, 10, "NewCampaign", &campaign_args()).unwrap();

        let id = [Value::from(1u32)];
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 2, 0, "Follow", &id)),
            "already following campaign"
        );
        assert_eq!(
            call(&mut randao, &bob, 2, 5, "Follow", &id).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            revert_reason(call(&mut randao, &bob, 3, 0, "Follow", &id)),
            "already following campaign"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &account("carol"), 9101, 0, "Follow", &id)),
            "too late to follow campaign"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &bob, 2, 0, "Follow", &[Value::from(2u32)])),
            "campaign 2 does not exist"
        );

        assert_eq!(randao.campaigns[0].bountypot, 15);
    }

    #[test]
    fn commit_reveal_random() {
        let mut randao = Randao::default();
        let alice = account("alice");
        let bob = account("bob");
        let deposit = 200000000000u128;

        call(&mut randao, &alice, 1, 0, "NewCampaign", &campaign_args()).unwrap();

        let id = Value::from(1u32);
        let commit = |s: u64| [id.clone(), Value::from(sha_commit(U256::from(s)))];
        let reveal = |s: u32| [id.clone(), Value::from(s)];

        assert_eq!(
            revert_reason(call(&mut randao, &alice, 8999, deposit, "Commit", &commit(100))),
            "not in commit phase"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9000, 1, "Commit", &commit(100))),
            "deposit of 200000000000 required"
        );
        let blank = [id.clone(), Value::Bytes(vec![0; 32])];
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9000, deposit, "Commit", &blank)),
            "commitment must not be blank"
        );

        call(&mut randao, &alice, 9000, deposit, "Commit", &commit(100)).unwrap();
        call(&mut randao, &bob, 9100, deposit, "Commit", &commit(7)).unwrap();
        assert_eq!(
            revert_reason(call(&mut randao, &bob, 9100, deposit, "Commit", &commit(7))),
            "already committed"
        );

        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9100, 0, "Reveal", &reveal(100))),
            "not in reveal phase"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9101, 0, "Reveal", &reveal(99))),
            "secret does not match commitment"
        );
        call(&mut randao, &alice, 9101, 0, "Reveal", &reveal(100)).unwrap();
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 9102, 0, "Reveal", &reveal(100))),
            "secret already revealed"
        );

        let env = CallEnv::new(&alice, 0, 9199, RANDAO, 0);
        assert_eq!(
            revert_reason(randao.query(&env, "GetRandom", Args::new(&[id.clone()]))),
            "campaign is not settled"
        );

        call(&mut randao, &bob, 9199, 0, "Reveal", &reveal(7)).unwrap();

        let env = CallEnv::new(&alice, 0, 9200, RANDAO, 0);
        assert_eq!(
            randao.query(&env, "GetRandom", Args::new(&[id.clone()])).unwrap(),
            Value::from(100u32 ^ 7)
        );
        assert!(!randao.campaigns[0].settled);

        call(&mut randao, &alice, 9200, 0, "GetRandom", &[id]).unwrap();
        assert!(randao.campaigns[0].settled);
    }

    #[test]
    fn bounty_shares_fines() {
        let mut randao = Randao::default();
        let consumer = account("consumer");
        let alice = account("alice");
        let bob = account("bob");
        let carol = account("carol");
        let id = Value::from(1u32);

        let args = [
            Value::from(300u32),
            Value::from(10u32),
            Value::from(20u32),
            Value::from(10u32),
        ];
        call(&mut randao, &consumer, 1, 90, "NewCampaign", &args).unwrap();

        for (who, secret) in [(&alice, 1u64), (&bob, 2), (&carol, 3)] {
            let hs = Value::from(sha_commit(U256::from(secret)));
            call(&mut randao, who, 285, 10, "Commit", &[id.clone(), hs]).unwrap();
        }

        // carol never reveals
        for (who, secret) in [(&alice, 1u32), (&bob, 2)] {
            call(&mut randao, who, 295, 0, "Reveal", &[id.clone(), Value::from(secret)]).unwrap();
        }

        assert_eq!(
            revert_reason(call(&mut randao, &alice, 299, 0, "GetMyBounty", &[id.clone()])),
            "not in bounty phase"
        );

        // the campaign failed: carol's deposit is split, the pot is not touched
        assert_eq!(
            call(&mut randao, &alice, 300, 0, "GetMyBounty", &[id.clone()]).unwrap(),
            Value::from(15u32)
        );
        assert_eq!(randao.campaigns[0].participants[&alice].reward, 5);
        assert_eq!(randao.campaigns[0].bountypot, 90);
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 301, 0, "GetMyBounty", &[id.clone()])),
            "bounty already claimed"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &carol, 301, 0, "GetMyBounty", &[id.clone()])),
            "secret was not revealed"
        );

        let env = CallEnv::new(&alice, 0, 300, RANDAO, 0);
        assert_eq!(
            revert_reason(randao.query(&env, "GetRandom", Args::new(&[id.clone()]))),
            "campaign is not settled"
        );

        // the campaign failed, so the consumer may take the bounty back
        assert_eq!(
            call(&mut randao, &consumer, 302, 0, "RefundBounty", &[id.clone()]).unwrap(),
            Value::from(90u32)
        );
        assert_eq!(
            revert_reason(call(&mut randao, &consumer, 303, 0, "RefundBounty", &[id.clone()])),
            "no bounty to refund"
        );
        assert_eq!(
            revert_reason(call(&mut randao, &alice, 303, 0, "RefundBounty", &[id])),
            "not a consumer of this campaign"
        );
    }

    #[test]
    fn no_reveals_refunds_deposit() {
        let mut randao = Randao::default();
        let alice = account("alice");
        let id = Value::from(1u32);

        let args = [
            Value::from(300u32),
            Value::from(10u32),
            Value::from(20u32),
            Value::from(10u32),
        ];
        call(&mut randao, &alice, 1, 0, "NewCampaign", &args).unwrap();

        let hs = Value::from(sha_commit(U256::from(5u32)));
        call(&mut randao, &alice, 280, 10, "Commit", &[id.clone(), hs]).unwrap();

        assert_eq!(
            call(&mut randao, &alice, 300, 0, "GetMyBounty", &[id]).unwrap(),
            Value::from(10u32)
        );
    }

    #[test]
    fn successful_campaign_cannot_be_refunded() {
        let mut randao = Randao::default();
        let alice = account("alice");
        let id = Value::from(1u32);

        let args = [
            Value::from(300u32),
            Value::from(10u32),
            Value::from(20u32),
            Value::from(10u32),
        ];
        call(&mut randao, &alice, 1, 40, "NewCampaign", &args).unwrap();

        let hs = Value::from(sha_commit(U256::from(5u32)));
        call(&mut randao, &alice, 280, 10, "Commit", &[id.clone(), hs]).unwrap();
        call(&mut randao, &alice, 295, 0, "Reveal", &[id.clone(), Value::from(5u32)]).unwrap();

        assert_eq!(
            revert_reason(call(&mut randao, &alice, 300, 0, "RefundBounty", &[id.clone()])),
            "campaign succeeded"
        );
        assert_eq!(
            call(&mut randao, &alice, 300, 0, "GetMyBounty", &[id]).unwrap(),
            Value::from(50u32)
        );
    }

    #[test]
    fn queries() {
        let mut randao = Randao::default();
        let alice = account("alice");
        let bob = account("bob");

        call(&mut randao, &alice, 1, 3, "NewCampaign", &campaign_args()).unwrap();

        let env = CallEnv::new(&alice, 0, 2, RANDAO, 0);

        assert_eq!(
            randao.query(&env, "NumCampaigns", Args::new(&[])).unwrap(),
            Value::from(1u32)
        );
        assert_eq!(
            randao
                .query(&env, "IsConsumer", Args::new(&[Value::from(1u32), Value::from(&alice)]))
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            randao
                .query(&env, "IsConsumer", Args::new(&[Value::from(1u32), Value::from(&bob)]))
                .unwrap(),
            Value::Bool(false)
        );

        let info = randao
            .query(&env, "GetCampaign", Args::new(&[Value::from(1u32)]))
            .unwrap();
        let info = info.as_list().unwrap();
        assert_eq!(info[0], Value::from(9200u32));
        assert_eq!(info[1], Value::from(200000000000u64));
        assert_eq!(info[6], Value::from(3u32));

        assert_eq!(
            randao
                .query(&env, "ShaCommit", Args::new(&[Value::from(100u32)]))
                .unwrap(),
            Value::from(sha_commit(U256::from(100u32)))
        );

        assert!(matches!(
            randao.query(&env, "Follow", Args::new(&[Value::from(1u32)])),
            Err(Revert::UnknownMethod)
        ));
    }
}
